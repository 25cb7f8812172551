//! Client session layer for the Cartwheel storefront API.
//!
//! - [`SessionContext`] - explicitly owned session: cookie jar, current user,
//!   JSON request helpers with one automatic retry after a token refresh
//! - [`RefreshCoordinator`] - single-flight access token refresh shared by
//!   every request that observes a 401

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod refresh;
pub mod session;

pub use error::{ClientError, RefreshFailure};
pub use refresh::RefreshCoordinator;
pub use session::{SessionContext, SessionUser};
