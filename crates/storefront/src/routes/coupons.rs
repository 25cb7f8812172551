//! Coupon route handlers.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwheel_core::DiscountPercent;

use crate::db::coupons::CouponRepository;
use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::RequireAuth;
use crate::models::Coupon;
use crate::state::AppState;

/// Coupon as shown to its owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    pub code: String,
    pub discount_percentage: DiscountPercent,
    pub expiration_date: DateTime<Utc>,
}

impl From<Coupon> for CouponView {
    fn from(coupon: Coupon) -> Self {
        Self {
            code: coupon.code,
            discount_percentage: coupon.discount_percentage,
            expiration_date: coupon.expiration_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    #[serde(default)]
    pub code: String,
}

/// Response to a successful validation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidCoupon {
    pub message: &'static str,
    pub code: String,
    pub discount_percentage: DiscountPercent,
}

/// The caller's active, unexpired coupon, or `null`.
///
/// GET /api/coupon
///
/// # Errors
///
/// Returns 401 without a valid session.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Option<CouponView>>, AppError> {
    let coupon = CouponRepository::new(state.pool())
        .find_active_for_user(user.id)
        .await?
        .filter(|coupon| !coupon.is_expired_at(Utc::now()));

    Ok(Json(coupon.map(CouponView::from)))
}

/// Check that a code names one of the caller's usable coupons.
///
/// POST /api/coupon/validate
///
/// An expired coupon is deactivated on the spot.
///
/// # Errors
///
/// Returns 404 "Coupon not found" for unknown, foreign or inactive codes and
/// 404 "Coupon expired" for expired ones.
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<ValidateCouponRequest>,
) -> Result<Json<ValidCoupon>, AppError> {
    let coupons = CouponRepository::new(state.pool());
    let coupon = coupons
        .find_active_by_code(req.code.trim(), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    if coupon.is_expired_at(Utc::now()) {
        coupons.deactivate(coupon.id).await?;
        tracing::info!(coupon_id = %coupon.id, user_id = %user.id, "Deactivated expired coupon");
        return Err(AppError::NotFound("Coupon expired".to_string()));
    }

    Ok(Json(ValidCoupon {
        message: "Coupon is valid",
        code: coupon.code,
        discount_percentage: coupon.discount_percentage,
    }))
}
