//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod cart;
pub mod discount;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod role;

pub use cart::{Cart, CartError, CartLine, Quantity, QuantityError};
pub use discount::{DiscountError, DiscountPercent};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::OrderLine;
pub use price::{Price, PriceError};
pub use role::UserRole;
