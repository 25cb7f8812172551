//! HTTP route handlers for the storefront API.
//!
//! # Route Structure (all under `/api`)
//!
//! ```text
//! # Auth (signup and login strictly rate limited, the rest loosely)
//! POST   /auth/signup              - Register and start a session
//! POST   /auth/login               - Start a session
//! POST   /auth/logout              - Revoke the refresh token, clear cookies
//! POST   /auth/refresh-token       - New access token from the refresh cookie
//! GET    /auth/profile             - Current user
//!
//! # Products
//! GET    /products                 - All products (admin)
//! POST   /products                 - Create product (admin)
//! GET    /products/featured        - Featured products (cached)
//! GET    /products/recommended     - Random sample
//! GET    /products/category/{c}    - Products in a category
//! PATCH  /products/{id}            - Toggle featured (admin)
//! DELETE /products/{id}            - Delete product (admin)
//!
//! # Cart
//! GET    /cart                     - Cart with product details
//! POST   /cart                     - Add one unit
//! DELETE /cart                     - Remove a line, or clear
//! PUT    /cart/{id}                - Set quantity
//!
//! # Coupons
//! GET    /coupon                   - Active coupon or null
//! POST   /coupon/validate          - Validate a code
//!
//! # Payments
//! POST   /payments/checkout-session
//! POST   /payments/checkout-success
//!
//! # Analytics
//! GET    /analytics                - Summary and daily series (admin)
//! ```

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod coupons;
pub mod payments;
pub mod products;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{auth_rate_limiter, rate_limit_json_body, session_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Credential routes get the strict limiter. Session routes run on every
/// page load and every access token expiry, so they share a looser one.
pub fn auth_routes() -> Router<AppState> {
    let credentials = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    let session = Router::new()
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/profile", get(auth::profile))
        .layer(session_rate_limiter());

    credentials
        .merge(session)
        .layer(axum::middleware::map_response(rate_limit_json_body))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/featured", get(products::featured))
        .route("/recommended", get(products::recommended))
        .route("/category/{category}", get(products::by_category))
        .route(
            "/{id}",
            patch(products::toggle_featured).delete(products::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart::show).post(cart::add).delete(cart::remove),
        )
        .route("/{id}", put(cart::update_quantity))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::show))
        .route("/validate", post(coupons::validate))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout-session",
            post(payments::create_checkout_session),
        )
        .route("/checkout-success", post(payments::checkout_success))
}

/// Create all API routes (mounted under `/api`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/coupon", coupon_routes())
        .nest("/payments", payment_routes())
        .route("/analytics", get(analytics::show))
}
