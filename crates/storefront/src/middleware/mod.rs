//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span opened above)
//! 4. CORS (client origin, credentials allowed)
//! 5. Rate limiting on `/api/auth` (governor)
//!
//! Authentication is not a layer: handlers opt in with the
//! [`RequireAuth`] and [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth, cookie_value, require_role};
pub use rate_limit::{auth_rate_limiter, rate_limit_json_body, session_rate_limiter};
pub use request_id::{RequestId, request_id_middleware};
