//! Discount coupon types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{CouponId, DiscountPercent, UserId};

/// A discount coupon owned by a single user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_percentage: DiscountPercent,
    pub expiration_date: DateTime<Utc>,
    pub user_id: UserId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let coupon = Coupon {
            id: CouponId::new(1),
            code: "GIFTAB12".to_string(),
            discount_percentage: DiscountPercent::new(10).unwrap(),
            expiration_date: now,
            user_id: UserId::new(7),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(!coupon.is_expired_at(now));
        assert!(coupon.is_expired_at(now + Duration::seconds(1)));
    }
}
