//! Domain models for the storefront.
//!
//! These types are validated domain objects, separate from the `FromRow`
//! row types in [`crate::db`].

pub mod coupon;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use coupon::Coupon;
pub use order::Order;
pub use product::{NewProduct, Product, RecommendedProduct};
pub use user::User;
