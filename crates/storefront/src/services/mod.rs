//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Signup, login and the access/refresh token lifecycle
//! - `catalog` - Product lifecycle and the featured-products cache
//! - `checkout` - Pricing, gateway sessions, gift coupons and order confirmation
//! - `analytics` - Admin sales report

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod checkout;
