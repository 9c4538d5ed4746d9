// Storage layer (S3-compatible)
//
// The object store is the source of truth for what exists. Everything the
// service reports is derived from `list` and the retention rules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::StorageConfig;

pub mod memory;
pub mod s3_client;

pub use memory::MemoryStore;
pub use s3_client::S3Store;

/// An object as reported by the store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub pathname: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    Configuration(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("url does not belong to this store: {0}")]
    ForeignUrl(String),

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("unexpected status {status} for {operation}")]
    Status { operation: &'static str, status: u16 },
}

impl From<s3::error::S3Error> for StorageError {
    fn from(e: s3::error::S3Error) -> Self {
        StorageError::Request(e.to_string())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every object whose pathname starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    async fn put(
        &self,
        pathname: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Deletes the object served at `url`.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;

    /// Returns a URL the client can PUT the object body to directly.
    async fn presign_upload(
        &self,
        pathname: &str,
        expires_in_secs: u32,
    ) -> Result<String, StorageError>;

    /// Maps a public object URL back to its pathname.
    fn pathname_of(&self, url: &str) -> Option<String>;
}

/// Builds the store selected by `STORAGE_PROVIDER`.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.provider.as_str() {
        "s3" => Ok(Arc::new(S3Store::new(config)?)),
        "memory" => Ok(Arc::new(MemoryStore::new(
            config
                .public_url
                .clone()
                .unwrap_or_else(|| "http://localhost:3000/blobs".to_string()),
        ))),
        other => Err(StorageError::Configuration(format!(
            "unknown storage provider {:?}",
            other
        ))),
    }
}

/// Joins a base URL and a pathname with exactly one slash.
pub(crate) fn join_url(base: &str, pathname: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        pathname.trim_start_matches('/')
    )
}

/// Inverse of [`join_url`].
pub(crate) fn strip_base(base: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(base.trim_end_matches('/'))?;
    let pathname = rest.strip_prefix('/')?;
    // Query strings and fragments are not part of the key.
    let pathname = pathname.split(['?', '#']).next().unwrap_or_default();
    if pathname.is_empty() {
        None
    } else {
        Some(pathname.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_strip_url() {
        let url = join_url("https://cdn.test/bucket/", "/videos/a.mp4");
        assert_eq!(url, "https://cdn.test/bucket/videos/a.mp4");
        assert_eq!(
            strip_base("https://cdn.test/bucket", &url).as_deref(),
            Some("videos/a.mp4")
        );
        assert_eq!(
            strip_base("https://cdn.test/bucket", "https://cdn.test/bucket/videos/a.mp4?v=1").as_deref(),
            Some("videos/a.mp4")
        );
        assert_eq!(strip_base("https://cdn.test/bucket", "https://other.test/videos/a.mp4"), None);
        assert_eq!(strip_base("https://cdn.test/bucket", "https://cdn.test/bucket/"), None);
        assert_eq!(strip_base("https://cdn.test/bucket", "https://cdn.test/bucketx/a.mp4"), None);
    }

    #[test]
    fn test_build_store_rejects_unknown_provider() {
        let config = StorageConfig {
            provider: "ftp".to_string(),
            ..StorageConfig::default()
        };
        assert!(matches!(
            build_store(&config),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_memory_store() {
        let config = StorageConfig {
            provider: "memory".to_string(),
            ..StorageConfig::default()
        };
        let store = build_store(&config).unwrap();
        assert_eq!(
            store.pathname_of("http://localhost:3000/blobs/videos/a.mp4").as_deref(),
            Some("videos/a.mp4")
        );
    }
}
