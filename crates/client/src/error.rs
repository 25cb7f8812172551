//! Client error types.

use thiserror::Error;

/// Why a token refresh did not produce a new access token.
///
/// `Clone` so one outcome can be handed to every caller waiting on the same
/// refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The server refused the refresh cookie.
    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The refresh request never got a response.
    #[error("refresh request failed: {0}")]
    Transport(String),
}

/// Errors returned by [`SessionContext`](crate::SessionContext).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or body decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request body could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Relative path could not be joined onto the API base URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The access token expired and could not be refreshed.
    #[error("session expired: {0}")]
    SessionExpired(#[from] RefreshFailure),
}

impl ClientError {
    /// HTTP status carried by the error, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SessionExpired(RefreshFailure::Rejected { status, .. }) => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Json(_) | Self::Url(_) | Self::SessionExpired(RefreshFailure::Transport(_)) => None,
        }
    }

    /// Whether the caller must log in again.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired(_) | Self::Api { status: 401, .. }
        )
    }
}
