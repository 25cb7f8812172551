//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`,
//! and every error reaches the client as JSON `{"message": ...}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;
use crate::cloudinary::MediaError;
use crate::db::RepositoryError;
use crate::services::analytics::AnalyticsError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::stripe::StripeError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or authorization failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Key-value cache failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Payment gateway failed.
    #[error("Payment gateway error: {0}")]
    Stripe(#[from] StripeError),

    /// Media store failed.
    #[error("Media store error: {0}")]
    Media(#[from] MediaError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,
}

impl AppError {
    /// HTTP status and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => internal(err),
            Self::Cache(err) => internal(err),
            Self::Auth(err) => auth_status(err),
            Self::Catalog(err) => catalog_status(err),
            Self::Checkout(err) => checkout_status(err),
            Self::Analytics(err) => match err {
                AnalyticsError::InvertedRange | AnalyticsError::RangeTooLong => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                AnalyticsError::Repository(e) => internal(e),
            },
            Self::Stripe(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            Self::Media(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
        }
    }
}

fn internal(err: &impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    let (status, message) = match err {
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address"),
        AuthError::MissingField(_) | AuthError::WeakPassword(_) => {
            return (StatusCode::BAD_REQUEST, err.to_string());
        }
        AuthError::UserAlreadyExists => (StatusCode::BAD_REQUEST, "User already exists"),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid email or password"),
        AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, "User not found"),
        AuthError::MissingAccessToken => (
            StatusCode::UNAUTHORIZED,
            "Unauthorized - No access token provided",
        ),
        AuthError::AccessTokenExpired => {
            (StatusCode::UNAUTHORIZED, "Unauthorized - Access token expired")
        }
        AuthError::InvalidAccessToken => {
            (StatusCode::UNAUTHORIZED, "Unauthorized - Invalid access token")
        }
        AuthError::MissingRefreshToken => (StatusCode::UNAUTHORIZED, "No refresh token provided"),
        AuthError::InvalidRefreshToken => (StatusCode::UNAUTHORIZED, "Invalid refresh token"),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "Access denied - Admin only"),
        AuthError::Signing(_)
        | AuthError::Cache(_)
        | AuthError::Repository(_)
        | AuthError::PasswordHash => return internal(err),
    };
    (status, message.to_string())
}

fn catalog_status(err: &CatalogError) -> (StatusCode, String) {
    match err {
        CatalogError::ProductNotFound => (StatusCode::NOT_FOUND, "Product not found".to_string()),
        CatalogError::NoFeaturedProducts => (
            StatusCode::NOT_FOUND,
            "No featured products found".to_string(),
        ),
        CatalogError::MissingField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CatalogError::Media(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        CatalogError::Repository(_) | CatalogError::Cache(_) => internal(err),
    }
}

fn checkout_status(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyProducts | CheckoutError::PaymentNotCompleted => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::ProductNotFound(_) => {
            (StatusCode::NOT_FOUND, "Product not found".to_string())
        }
        CheckoutError::SessionNotFound => (
            StatusCode::NOT_FOUND,
            "Checkout session not found".to_string(),
        ),
        CheckoutError::Stripe(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        CheckoutError::InvalidMetadata(_) | CheckoutError::Repository(_) => internal(err),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use cartwheel_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_message(err: AppError) -> String {
        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("test".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            get_status(AuthError::MissingAccessToken.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Forbidden.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(CatalogError::NoFeaturedProducts.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::EmptyProducts.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::ProductNotFound(ProductId::new(9)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::PaymentNotCompleted.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AnalyticsError::InvertedRange.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json_message() {
        assert_eq!(
            get_message(AuthError::AccessTokenExpired.into()).await,
            "Unauthorized - Access token expired"
        );
        assert_eq!(
            get_message(AuthError::Forbidden.into()).await,
            "Access denied - Admin only"
        );
        assert_eq!(
            get_message(CheckoutError::EmptyProducts.into()).await,
            "Invalid or empty products array"
        );
        assert_eq!(
            get_message(RepositoryError::Conflict("boom".to_string()).into()).await,
            "constraint violation: boom"
        );
    }
}
