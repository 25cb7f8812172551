//! Cartwheel storefront library.
//!
//! JSON API for the storefront: cookie-based JWT sessions, the product
//! catalog with a cached featured set, per-user carts, coupons, Stripe
//! checkout and an admin sales report. Exposed as a library so the router
//! can be driven directly in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cloudinary;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Build the full application router.
///
/// Sentry layers are outermost, then request tracing with the request ID
/// recorded on the span, then CORS.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().base_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::routes())
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// `Origin` header value of the client application.
fn client_origin(base_url: &str) -> Option<HeaderValue> {
    let url = url::Url::parse(base_url).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    HeaderValue::from_str(&origin.ascii_serialization()).ok()
}

/// CORS for the client application: its origin only, with credentials.
fn cors_layer(base_url: &str) -> CorsLayer {
    let allow_origin = client_origin(base_url).map_or_else(
        || {
            tracing::warn!(%base_url, "Base URL has no usable origin, cross-origin requests disabled");
            AllowOrigin::list([])
        },
        AllowOrigin::exact,
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_origin_strips_path() {
        assert_eq!(
            client_origin("https://shop.example.com/app/"),
            Some(HeaderValue::from_static("https://shop.example.com"))
        );
        assert_eq!(
            client_origin("http://localhost:5173"),
            Some(HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(client_origin("not a url"), None);
        assert_eq!(client_origin("data:text/plain,hi"), None);
    }
}
