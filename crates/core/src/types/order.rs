//! Order line records.

use serde::{Deserialize, Serialize};

use super::cart::Quantity;
use super::id::ProductId;
use super::price::Price;

/// A purchased product as recorded on an order.
///
/// The same shape is embedded in payment-session metadata, so a confirmed
/// payment can rebuild the order without trusting a second client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Purchased product.
    #[serde(rename = "id")]
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: Quantity,
    /// Unit price at checkout time.
    pub price: Price,
}

impl OrderLine {
    /// Line total in minor units.
    #[must_use]
    pub fn total_minor_units(&self) -> i64 {
        self.price
            .to_minor_units()
            .saturating_mul(i64::from(self.quantity.get()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_metadata_shape() {
        let lines: Vec<OrderLine> =
            serde_json::from_str(r#"[{"id": 1, "quantity": 2, "price": 10}]"#).unwrap();
        assert_eq!(lines.len(), 1);
        let line = lines.first().unwrap();
        assert_eq!(line.product_id, ProductId::new(1));
        assert_eq!(line.quantity.get(), 2);
        assert_eq!(line.price.amount(), Decimal::new(10, 0));
        assert_eq!(line.total_minor_units(), 2000);
    }

    #[test]
    fn test_metadata_rejects_zero_quantity() {
        let parsed =
            serde_json::from_str::<Vec<OrderLine>>(r#"[{"id": 1, "quantity": 0, "price": 10}]"#);
        assert!(parsed.is_err());
    }
}
