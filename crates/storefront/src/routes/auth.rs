//! Authentication route handlers.
//!
//! Tokens are delivered as HTTP-only, `SameSite=Strict` cookies; response
//! bodies never contain them.

use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

use cartwheel_core::{Email, UserId, UserRole};

use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::extract::ValidJson;
use crate::middleware::{RequireAuth, cookie_value};
use crate::models::User;
use crate::models::session::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, cookies};
use crate::services::auth::{AuthError, AuthService, TokenPair};
use crate::state::AppState;

/// Signup form.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User returned by signup and login.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Build an auth cookie with the attributes every session cookie shares.
fn session_cookie(name: &'static str, value: String, ttl: Duration, secure: bool) -> String {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age))
        .build()
        .to_string()
}

/// Expire an auth cookie.
fn removal_cookie(name: &'static str, secure: bool) -> String {
    let mut cookie = Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .build();
    cookie.make_removal();
    cookie.to_string()
}

/// Issue and persist a token pair, returning the two `Set-Cookie` values.
async fn start_session(
    state: &AppState,
    user_id: UserId,
) -> Result<[(axum::http::HeaderName, String); 2], AppError> {
    let TokenPair { access, refresh } = state.tokens().issue_token_pair(user_id)?;
    state.tokens().persist_refresh(user_id, &refresh).await?;

    let secure = state.config().secure_cookies();
    Ok([
        (
            SET_COOKIE,
            session_cookie(cookies::ACCESS_TOKEN, access, ACCESS_TOKEN_TTL, secure),
        ),
        (
            SET_COOKIE,
            session_cookie(cookies::REFRESH_TOKEN, refresh, REFRESH_TOKEN_TTL, secure),
        ),
    ])
}

/// Register a customer and log them in.
///
/// POST /api/auth/signup
///
/// # Errors
///
/// Returns 400 for invalid input or an existing email.
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool())
        .signup(&req.name, &req.email, &req.password)
        .await?;

    let cookies = start_session(&state, user.id).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok((
        StatusCode::CREATED,
        AppendHeaders(cookies),
        Json(UserSummary::from(user)),
    ))
}

/// Log in with email and password.
///
/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 "Invalid email or password" on any credential mismatch.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool())
        .login(&req.email, &req.password)
        .await?;

    let cookies = start_session(&state, user.id).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((AppendHeaders(cookies), Json(UserSummary::from(user))))
}

/// Revoke the refresh token and clear both cookies.
///
/// POST /api/auth/logout
///
/// An unknown or invalid refresh token is not an error; the cookies are
/// cleared either way.
///
/// # Errors
///
/// Returns 500 if the token store fails.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(refresh) = cookie_value(&headers, cookies::REFRESH_TOKEN)
        && let Some(user_id) = state.tokens().revoke_refresh(&refresh).await?
    {
        tracing::info!(%user_id, "User logged out");
    }

    clear_sentry_user();
    let secure = state.config().secure_cookies();
    Ok((
        AppendHeaders([
            (SET_COOKIE, removal_cookie(cookies::ACCESS_TOKEN, secure)),
            (SET_COOKIE, removal_cookie(cookies::REFRESH_TOKEN, secure)),
        ]),
        Json(json!({ "message": "Logged out successfully" })),
    ))
}

/// Exchange the refresh cookie for a new access cookie.
///
/// POST /api/auth/refresh-token
///
/// # Errors
///
/// Returns 401 if the refresh token is missing, invalid, expired or revoked.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let refresh =
        cookie_value(&headers, cookies::REFRESH_TOKEN).ok_or(AuthError::MissingRefreshToken)?;

    let access = state.tokens().rotate_access(&refresh).await?;
    add_breadcrumb("auth", "Access token refreshed", None);

    let secure = state.config().secure_cookies();
    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(cookies::ACCESS_TOKEN, access, ACCESS_TOKEN_TTL, secure),
        )]),
        Json(json!({ "message": "Token refreshed successfully" })),
    ))
}

/// The authenticated user, cart included.
///
/// GET /api/auth/profile
pub async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}
