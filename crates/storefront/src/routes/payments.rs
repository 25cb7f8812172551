//! Payment route handlers.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwheel_core::OrderId;

use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutItem, CheckoutService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    #[serde(default)]
    pub products: Vec<CheckoutItem>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// A created checkout session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub id: String,
    /// Hosted payment page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Amount due in major units.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: OrderId,
}

fn checkout(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(state.pool(), state.stripe(), &state.config().base_url)
}

/// Open a gateway checkout session for the requested products.
///
/// POST /api/payments/checkout-session
///
/// # Errors
///
/// Returns 400 for an empty product list, 404 for unknown products and 502
/// if the gateway rejects the session.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<CheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, AppError> {
    let started = checkout(&state)
        .start(user.id, &req.products, req.coupon_code.as_deref())
        .await?;

    Ok(Json(CheckoutSessionResponse {
        id: started.session_id,
        url: started.url,
        total_amount: Decimal::new(started.total, 2),
    }))
}

/// Record the order for a paid session.
///
/// POST /api/payments/checkout-success
///
/// # Errors
///
/// Returns 400 "Payment not completed" unless the gateway reports the
/// session as paid.
pub async fn checkout_success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<CheckoutSuccessRequest>,
) -> Result<Json<CheckoutSuccessResponse>, AppError> {
    let order = checkout(&state)
        .confirm(user.id, req.session_id.trim())
        .await?;

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        message: "Payment successful, order created, and coupon deactivated if used.",
        order_id: order.id,
    }))
}
