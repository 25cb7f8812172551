//! Authentication error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] cartwheel_core::EmailError),

    /// A required signup field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The authenticated user no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// No access token cookie on the request.
    #[error("no access token provided")]
    MissingAccessToken,

    /// Access token signature is valid but `exp` has passed.
    #[error("access token expired")]
    AccessTokenExpired,

    /// Access token is malformed or signed with another key.
    #[error("invalid access token")]
    InvalidAccessToken,

    /// No refresh token cookie on the request.
    #[error("no refresh token provided")]
    MissingRefreshToken,

    /// Refresh token is invalid, expired, or not the one on record.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Authenticated, but the role is insufficient.
    #[error("access denied")]
    Forbidden,

    /// Token signing failed.
    #[error("token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Refresh token store failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
