//! Cartwheel Core - Shared domain types.
//!
//! This crate provides the value types used across all Cartwheel components:
//! - `storefront` - JSON API server (catalog, cart, coupons, checkout, analytics)
//! - `client` - Client session layer with single-flight token refresh
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! database access, no HTTP clients. Invariants such as "a cart line holds at
//! least one unit" or "a price is never negative" are enforced by the
//! constructors here, so every layer above can rely on them.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, quantities, roles, carts and order lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
