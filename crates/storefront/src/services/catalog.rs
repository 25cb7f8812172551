//! Catalog service: product lifecycle and the featured-products cache.
//!
//! The featured set is cached under [`FEATURED_PRODUCTS_KEY`] with no TTL.
//! Reads populate it on a miss; any write that can change the set calls
//! [`CatalogService::refresh_featured_cache`], which recomputes and
//! overwrites it. Concurrent refreshes race and the last writer wins.

use sqlx::PgPool;
use thiserror::Error;

use cartwheel_core::ProductId;

use crate::cache::{CacheError, KvCache};
use crate::cloudinary::{self, MediaError, MediaStore};
use crate::db::RepositoryError;
use crate::db::products::{ProductInsert, ProductRepository};
use crate::models::{NewProduct, Product, RecommendedProduct};

/// Cache key holding the JSON-encoded featured products.
pub const FEATURED_PRODUCTS_KEY: &str = "featured_products";

/// Number of products returned by the recommendations endpoint.
pub const RECOMMENDATION_COUNT: i64 = 4;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found")]
    ProductNotFound,

    #[error("no featured products found")]
    NoFeaturedProducts,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Catalog operations over the product repository, cache and media store.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    cache: &'a KvCache,
    media: Option<&'a MediaStore>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a KvCache, media: Option<&'a MediaStore>) -> Self {
        Self {
            products: ProductRepository::new(pool),
            cache,
            media,
        }
    }

    /// Every product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list().await?)
    }

    /// Products in one category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list_by_category(category).await?)
    }

    /// Featured products, served from the cache when present.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoFeaturedProducts` if nothing is featured.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        if let Some(products) = self
            .cache
            .get_json::<Vec<Product>>(FEATURED_PRODUCTS_KEY)
            .await?
        {
            tracing::debug!(count = products.len(), "Featured products cache hit");
            return non_empty_featured(products);
        }

        tracing::debug!("Featured products cache miss");
        let products = self.products.list_featured().await?;
        self.cache.set_json(FEATURED_PRODUCTS_KEY, &products).await?;
        non_empty_featured(products)
    }

    /// Recompute the featured set and overwrite the cache with it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the query or the cache write fails.
    pub async fn refresh_featured_cache(&self) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.list_featured().await?;
        self.cache.set_json(FEATURED_PRODUCTS_KEY, &products).await?;
        tracing::info!(count = products.len(), "Featured products cache refreshed");
        Ok(products)
    }

    /// A random sample of products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn recommended(&self) -> Result<Vec<RecommendedProduct>, CatalogError> {
        Ok(self.products.sample(RECOMMENDATION_COUNT).await?)
    }

    /// Create a product, uploading a `data:` image when a media store is configured.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::MissingField` for blank text fields and
    /// `CatalogError::Media` if the upload fails.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, CatalogError> {
        if let Some(field) = new.missing_field() {
            return Err(CatalogError::MissingField(field));
        }

        let image = match self.media {
            Some(media) if cloudinary::is_data_uri(&new.image) => {
                media.upload(&new.image).await?.secure_url
            }
            _ => new.image.clone(),
        };

        let product = self
            .products
            .create(&ProductInsert {
                name: new.name.trim(),
                description: new.description.trim(),
                price: new.price,
                image: &image,
                category: new.category.trim(),
            })
            .await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Delete a product and, best effort, its hosted image.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Product, CatalogError> {
        let product = self
            .products
            .delete(id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        if let Some(media) = self.media
            && let Some(public_id) = cloudinary::public_id_from_url(&product.image)
            && let Err(e) = media.destroy(&public_id).await
        {
            tracing::warn!(product_id = %id, %public_id, error = %e, "Failed to delete product image");
        }

        if product.is_featured {
            self.refresh_featured_cache().await?;
        }

        tracing::info!(product_id = %id, "Product deleted");
        Ok(product)
    }

    /// Flip the featured flag and refresh the featured cache.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if the product does not exist.
    pub async fn toggle_featured(&self, id: ProductId) -> Result<Product, CatalogError> {
        let product = self
            .products
            .toggle_featured(id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        self.refresh_featured_cache().await?;
        Ok(product)
    }
}

fn non_empty_featured(products: Vec<Product>) -> Result<Vec<Product>, CatalogError> {
    if products.is_empty() {
        Err(CatalogError::NoFeaturedProducts)
    } else {
        Ok(products)
    }
}
