//! Authentication extractors.
//!
//! The access token travels in the `accessToken` cookie. `RequireAuth`
//! verifies it and loads the user; `RequireAdmin` additionally checks the
//! role.
//!
//! ```rust,ignore
//! async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
//!     Json(user)
//! }
//! ```

use axum::{extract::FromRequestParts, http::HeaderMap, http::header, http::request::Parts};
use cookie::Cookie;

use cartwheel_core::UserRole;

use crate::db::users::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::models::session::cookies;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Extractor that requires an authenticated user.
pub struct RequireAuth(pub User);

/// Extractor that requires an authenticated admin.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, cookies::ACCESS_TOKEN)
            .ok_or(AuthError::MissingAccessToken)?;

        let claims = state.tokens().verify_access(&token)?;
        let user_id = claims.user_id()?;

        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::UserNotFound)?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        require_role(&user, UserRole::Admin)?;
        Ok(Self(user))
    }
}

/// Check that `user` holds `role`.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` otherwise.
pub fn require_role(user: &User, role: UserRole) -> Result<(), AuthError> {
    if user.role == role {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, required = %role, "Role check failed");
        Err(AuthError::Forbidden)
    }
}

/// Value of the cookie named `name`, if any `Cookie` header carries it.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
