// In-process object store for local development and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{join_url, strip_base, ObjectStore, StorageError, StoredObject};

#[derive(Clone, Default)]
pub struct MemoryStore {
    base_url: String,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    deletes: Arc<AtomicUsize>,
    fail_list: Arc<AtomicBool>,
    fail_delete: Arc<RwLock<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn url_for(&self, pathname: &str) -> String {
        join_url(&self.base_url, pathname)
    }

    /// Inserts an object with an explicit upload time.
    pub async fn insert(&self, pathname: &str, size: u64, uploaded_at: DateTime<Utc>) -> StoredObject {
        let object = StoredObject {
            url: self.url_for(pathname),
            pathname: pathname.to_string(),
            size,
            uploaded_at,
        };
        self.objects
            .write()
            .await
            .insert(pathname.to_string(), object.clone());
        object
    }

    pub async fn contains(&self, pathname: &str) -> bool {
        self.objects.read().await.contains_key(pathname)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of successful deletes since creation.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `list` call fail.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Makes deletes of `pathname` fail.
    pub async fn fail_delete_of(&self, pathname: &str) {
        self.fail_delete.write().await.insert(pathname.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::Request("listing unavailable".to_string()));
        }
        let guard = self.objects.read().await;
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn put(
        &self,
        pathname: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        Ok(self.insert(pathname, data.len() as u64, Utc::now()).await)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let pathname = self
            .pathname_of(url)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        if self.fail_delete.read().await.contains(&pathname) {
            return Err(StorageError::Request(format!("delete of {} rejected", pathname)));
        }
        match self.objects.write().await.remove(&pathname) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StorageError::NotFound(pathname)),
        }
    }

    async fn presign_upload(
        &self,
        pathname: &str,
        expires_in_secs: u32,
    ) -> Result<String, StorageError> {
        Ok(format!("{}?expires={}", self.url_for(pathname), expires_in_secs))
    }

    fn pathname_of(&self, url: &str) -> Option<String> {
        strip_base(&self.base_url, url)
    }
}
