//! Session transport types.
//!
//! Auth state travels in two HTTP-only cookies. The access token is
//! stateless; the refresh token is also stored in the cache so logout can
//! revoke it.

use std::time::Duration;

/// Lifetime of an access token and its cookie.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a refresh token, its cookie and its cache entry.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cookie names for authentication data.
pub mod cookies {
    /// Cookie carrying the short-lived access token.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Cookie carrying the long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";
}
