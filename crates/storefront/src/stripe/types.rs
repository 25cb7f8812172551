//! Stripe API request and response types.

use std::collections::HashMap;

use serde::Deserialize;

/// Payment status of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// A Stripe Checkout session (the fields the storefront reads).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Amount charged after discounts, in minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Hosted payment page.
    #[serde(default)]
    pub url: Option<String>,
}

/// A Stripe coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCoupon {
    pub id: String,
}

/// One priced line of a checkout session.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    /// Image URL shown on the hosted page; omitted when empty.
    pub image: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Parameters for creating a checkout session.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Gateway coupon applied to the whole session.
    pub coupon_id: Option<String>,
    pub metadata: Vec<(String, String)>,
}

impl NewCheckoutSession {
    /// Encode as Stripe's bracketed form parameters.
    #[must_use]
    pub fn to_form(&self, currency: &str) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                currency.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            if !item.image.is_empty() {
                form.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    item.image.clone(),
                ));
            }
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        if let Some(coupon) = &self.coupon_id {
            form.push(("discounts[0][coupon]".to_string(), coupon.clone()));
        }

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        form
    }
}

#[derive(Deserialize)]
pub(super) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Deserialize)]
pub(super) struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}
