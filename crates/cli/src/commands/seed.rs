//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! - name: Canvas Tote
//!   description: Heavyweight cotton tote
//!   price: 24.00
//!   category: bags
//!   image: https://res.cloudinary.com/demo/image/upload/tote.jpg
//!   featured: true
//! ```

use std::path::Path;

use cartwheel_core::Price;
use cartwheel_storefront::db::products::{ProductInsert, ProductRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

/// One product entry in the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub featured: bool,
}

/// Parse and validate a seed document.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or an entry has a negative
/// price or an empty name or category.
pub fn parse(content: &str) -> Result<Vec<(SeedProduct, Price)>, Box<dyn std::error::Error>> {
    let entries: Vec<SeedProduct> = serde_yaml::from_str(content)?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| -> Result<_, Box<dyn std::error::Error>> {
            if entry.name.trim().is_empty() || entry.category.trim().is_empty() {
                return Err(format!("entry {index}: name and category are required").into());
            }
            let price =
                Price::new(entry.price).map_err(|e| format!("entry {index} ({}): {e}", entry.name))?;
            Ok((entry, price))
        })
        .collect()
}

/// Insert every product from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let entries = parse(&content)?;
    info!(products = entries.len(), "Parsed seed file");

    let pool = super::connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut featured = 0usize;
    for (entry, price) in &entries {
        let product = repo
            .create(&ProductInsert {
                name: entry.name.trim(),
                description: entry.description.trim(),
                price: *price,
                image: &entry.image,
                category: entry.category.trim(),
            })
            .await?;

        if entry.featured {
            if repo.toggle_featured(product.id).await?.is_none() {
                warn!(product_id = %product.id, "Product vanished before it could be featured");
            } else {
                featured += 1;
            }
        }
    }

    info!(
        inserted = entries.len(),
        featured, "Seeding complete. Restart the storefront or toggle a product to refresh the featured cache"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_file() {
        let yaml = r"
- name: Canvas Tote
  description: Heavyweight cotton tote
  price: 24.50
  category: bags
  featured: true
- name: Wool Beanie
  description: Ribbed knit
  price: 18
  category: hats
";
        let entries = parse(yaml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.name, "Canvas Tote");
        assert!(entries[0].0.featured);
        assert_eq!(entries[0].1.amount(), Decimal::new(2450, 2));
        assert!(!entries[1].0.featured);
        assert!(entries[1].0.image.is_empty());
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        let yaml = "- {name: Bad, description: x, price: -1, category: misc}";
        let err = parse(yaml).unwrap_err();
        assert!(err.to_string().contains("entry 0"));
    }

    #[test]
    fn test_parse_rejects_missing_category() {
        let yaml = "- {name: Bad, description: x, price: 1, category: '  '}";
        assert!(parse(yaml).is_err());
    }
}
