//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwheel_core::{Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Hosted image URL; empty when the product has no image.
    pub image: String,
    pub category: String,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a product.
///
/// `image` is either a URL stored as given or a `data:` URI that is
/// uploaded to the media store first.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    pub category: String,
}

impl NewProduct {
    /// Name of the first required text field that is blank, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("description", &self.description),
            ("category", &self.category),
        ]
        .into_iter()
        .find_map(|(field, value)| value.trim().is_empty().then_some(field))
    }
}

/// Projection returned by the recommendations endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RecommendedProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image: String,
    pub price: Price,
}
