//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::KvCache;
use crate::cloudinary::{MediaError, MediaStore};
use crate::config::StorefrontConfig;
use crate::services::auth::TokenService;
use crate::stripe::{StripeClient, StripeError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Stripe(#[from] StripeError),
    #[error("media store client: {0}")]
    Media(#[from] MediaError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    cache: KvCache,
    tokens: TokenService,
    stripe: StripeClient,
    media: Option<MediaStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    /// * `cache` - Key-value cache for refresh tokens and the featured set
    ///
    /// # Errors
    ///
    /// Returns an error if a gateway HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool, cache: KvCache) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.tokens, cache.clone());
        let stripe = StripeClient::new(&config.stripe)?;
        let media = config.cloudinary.as_ref().map(MediaStore::new).transpose()?;

        if media.is_none() {
            tracing::info!("Cloudinary not configured, product images are stored as given");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache,
                tokens,
                stripe,
                media,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cache(&self) -> &KvCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// The media store, when Cloudinary is configured.
    #[must_use]
    pub fn media(&self) -> Option<&MediaStore> {
        self.inner.media.as_ref()
    }
}
