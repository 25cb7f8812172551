//! Key-value cache for refresh tokens and the featured product set.
//!
//! Backed by Redis when `REDIS_URL` is configured, otherwise by an
//! in-process `moka` cache. The in-process backend honours per-entry TTLs
//! the same way `SET key value EX ttl` does, and a plain `set` clears any
//! previous TTL.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cached value could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A value held by the in-process backend together with its TTL.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    value: String,
    ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, CachedEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Cache handle shared across handlers. Cloning is cheap.
#[derive(Clone)]
pub enum KvCache {
    /// Shared Redis instance.
    Redis(ConnectionManager),
    /// Process-local cache; contents are lost on restart.
    Memory(Cache<String, CachedEntry>),
}

impl std::fmt::Debug for KvCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redis(_) => f.write_str("KvCache::Redis"),
            Self::Memory(cache) => write!(f, "KvCache::Memory({} entries)", cache.entry_count()),
        }
    }
}

impl KvCache {
    /// Connect to Redis, or fall back to the in-process cache when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(redis_url: Option<&SecretString>) -> Result<Self, CacheError> {
        let Some(url) = redis_url else {
            tracing::info!("REDIS_URL not set, using in-process cache");
            return Ok(Self::memory());
        };

        let client = redis::Client::open(url.expose_secret())?;
        let manager = client.get_connection_manager().await?;
        tracing::info!("Redis connection established");
        Ok(Self::Redis(manager))
    }

    /// Create an empty in-process cache.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(
            Cache::builder()
                .max_capacity(100_000)
                .expire_after(EntryExpiry)
                .build(),
        )
    }

    /// Get the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the Redis command fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            Self::Redis(manager) => {
                let mut conn = manager.clone();
                Ok(conn.get::<_, Option<String>>(key).await?)
            }
            Self::Memory(cache) => Ok(cache.get(key).await.map(|entry| entry.value)),
        }
    }

    /// Store `value` under `key` with no expiry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the Redis command fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        match self {
            Self::Redis(manager) => {
                let mut conn = manager.clone();
                conn.set::<_, _, ()>(key, value).await?;
            }
            Self::Memory(cache) => {
                cache
                    .insert(
                        key.to_owned(),
                        CachedEntry {
                            value: value.to_owned(),
                            ttl: None,
                        },
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the Redis command fails.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        match self {
            Self::Redis(manager) => {
                let mut conn = manager.clone();
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await?;
            }
            Self::Memory(cache) => {
                cache
                    .insert(
                        key.to_owned(),
                        CachedEntry {
                            value: value.to_owned(),
                            ttl: Some(ttl),
                        },
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Remove `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the Redis command fails.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Self::Redis(manager) => {
                let mut conn = manager.clone();
                conn.del::<_, ()>(key).await?;
            }
            Self::Memory(cache) => cache.invalidate(key).await,
        }
        Ok(())
    }

    /// Get and decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the lookup fails or the stored value is not
    /// valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a JSON value with no expiry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the write fails.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let cache = KvCache::memory();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_entries_expire() {
        let cache = KvCache::memory();
        cache
            .set_ex("short", "v", Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set_ex("long", "v", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_plain_set_clears_ttl() {
        let cache = KvCache::memory();
        cache
            .set_ex("k", "old", Duration::from_millis(50))
            .await
            .unwrap();
        cache.set("k", "new").await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let cache = KvCache::memory();
        cache.set_json("nums", &vec![1, 2, 3]).await.unwrap();
        let nums: Option<Vec<i32>> = cache.get_json("nums").await.unwrap();
        assert_eq!(nums, Some(vec![1, 2, 3]));

        cache.set("bad", "not json").await.unwrap();
        let bad = cache.get_json::<Vec<i32>>("bad").await;
        assert!(matches!(bad, Err(CacheError::Serialization(_))));
    }
}
