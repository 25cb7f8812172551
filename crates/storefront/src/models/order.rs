//! Order types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{OrderId, OrderLine, Price, UserId};

/// A confirmed purchase. Orders are never modified after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    /// Amount charged by the payment gateway, in currency units.
    pub total_amount: Price,
    /// Gateway checkout session that paid for this order.
    pub stripe_session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
