//! Cache layer
//!
//! Process-local cache (moka) in front of the public read endpoints.
//! Writes to gallery events or blog posts invalidate the affected keys.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kaizen_admin::cache::{create_cache, CacheLayer};
//! use kaizen_admin::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", cache.default_ttl()).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods make this trait unusable as `dyn CacheLayer`;
/// services hold the concrete `Arc<MemoryCache>`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Shared cache handle
pub type SharedCache = Arc<MemoryCache>;

/// Create the cache described by the configuration
pub fn create_cache(config: &CacheConfig) -> SharedCache {
    Arc::new(MemoryCache::new(
        config.max_entries,
        Duration::from_secs(config.ttl_seconds),
    ))
}

/// Keys shared between the writers and the public read API
pub mod keys {
    /// Prefix of every public API entry
    pub const PUBLIC_PREFIX: &str = "public:";
    pub const PUBLIC_GALLERY: &str = "public:gallery";
    pub const PUBLIC_BLOG: &str = "public:blog";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_uses_configured_ttl() {
        let config = CacheConfig {
            ttl_seconds: 42,
            max_entries: 10,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(42));

        cache.set(keys::PUBLIC_BLOG, &"[]", cache.default_ttl()).await.unwrap();
        assert!(cache.get::<String>(keys::PUBLIC_BLOG).await.unwrap().is_some());
    }
}
