//! Kept-list cache
//!
//! The cache mirrors the most recent kept list per category so reads can
//! skip a store listing. It is advisory: callers fall back to the store on
//! any error, and writes that fail are logged and dropped.

pub mod memory;
pub mod redis_cache;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RedisConfig;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache is disabled")]
    Disabled,

    #[error("cache connection failed: {0}")]
    Connect(String),

    #[error("cache connection timed out after {0}ms")]
    Timeout(u64),

    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Round-trips to the backend. Used by the health check.
    async fn ping(&self) -> Result<(), CacheError>;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Releases any held connection.
    async fn shutdown(&self) {}
}

/// Stand-in used when no cache URL is configured. Every read misses with
/// an error so callers take the store path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl CacheStore for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Disabled)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(CacheError::Disabled)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Builds the cache for `config`. Nothing connects until first use.
pub fn build_cache(config: &RedisConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match &config.url {
        Some(_) => Ok(Arc::new(RedisCache::new(config)?)),
        None => Ok(Arc::new(DisabledCache)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_always_errors() {
        let cache = DisabledCache;
        assert!(!cache.is_enabled());
        assert!(matches!(cache.get("videos").await, Err(CacheError::Disabled)));
        assert!(matches!(cache.set("videos", "[]").await, Err(CacheError::Disabled)));
    }

    #[test]
    fn test_build_without_url_is_disabled() {
        let cache = build_cache(&RedisConfig::default()).unwrap();
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_build_with_url_is_lazy() {
        let config = RedisConfig {
            url: Some("redis://127.0.0.1:1".to_string()),
            ..RedisConfig::default()
        };
        // Constructing must not touch the network.
        let cache = build_cache(&config).unwrap();
        assert!(cache.is_enabled());
    }
}
