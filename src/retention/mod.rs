//! Retention policy engine
//!
//! Each category keeps its newest `limit` items. [`plan`] decides what
//! stays and what goes; [`RetentionEngine`] applies that decision against
//! the object store and mirrors the kept list into the cache.
//!
//! The store is authoritative. The cache only ever holds a copy of the last
//! computed kept list and can be lost at any time without affecting
//! correctness: every read path falls back to a fresh listing.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::config::RetentionConfig;
use crate::media::{newest_first, Category, CategoryPolicy, KeptList, MediaItem};
use crate::storage::{ObjectStore, StorageError, StoredObject};

/// Outcome of applying a policy to a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Newest first, at most `limit` long.
    pub kept: KeptList,
    /// Everything older than the kept window, newest first.
    pub removed: Vec<MediaItem>,
}

/// Filters `objects` to the policy's category, orders newest first and
/// splits at the retention limit.
pub fn plan(policy: &CategoryPolicy, objects: Vec<StoredObject>) -> RetentionPlan {
    let mut items: Vec<MediaItem> = objects
        .into_iter()
        .filter(|object| policy.matches(&object.pathname))
        .map(|object| MediaItem::from_object(object, policy.category))
        .collect();
    items.sort_by(newest_first);

    let removed = if items.len() > policy.limit {
        items.split_off(policy.limit)
    } else {
        Vec::new()
    };

    RetentionPlan {
        kept: items,
        removed,
    }
}

#[derive(Clone)]
pub struct RetentionEngine {
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheStore>,
    config: RetentionConfig,
}

impl RetentionEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn policy(&self, category: Category) -> CategoryPolicy {
        category.policy(&self.config)
    }

    async fn list(&self, category: Category) -> Result<Vec<StoredObject>, StorageError> {
        self.store.list(category.prefix()).await
    }

    /// Applies the policy: deletes everything outside the kept window and
    /// writes the kept list to the cache.
    ///
    /// Individual delete failures are logged and skipped. A listing failure
    /// yields an empty list and deletes nothing.
    pub async fn reconcile(&self, category: Category) -> KeptList {
        let objects = match self.list(category).await {
            Ok(objects) => objects,
            Err(e) => {
                error!("Listing {} failed during reconcile: {}", category, e);
                return Vec::new();
            }
        };

        let RetentionPlan { kept, removed } = plan(&self.policy(category), objects);

        let mut deleted = 0usize;
        for item in &removed {
            match self.store.delete(&item.url).await {
                Ok(()) => {
                    deleted += 1;
                    debug!("Evicted {} ({})", item.pathname, category);
                }
                Err(e) => warn!("Failed to evict {}: {}", item.pathname, e),
            }
        }
        if !removed.is_empty() {
            info!(
                "Reconciled {}: kept {}, evicted {}/{}",
                category,
                kept.len(),
                deleted,
                removed.len()
            );
        }

        self.write_cache(category, &kept).await;
        kept
    }

    /// Builds the kept list from a fresh listing without deleting anything.
    pub async fn recompute(&self, category: Category) -> KeptList {
        match self.list(category).await {
            Ok(objects) => plan(&self.policy(category), objects).kept,
            Err(e) => {
                error!("Listing {} failed: {}", category, e);
                Vec::new()
            }
        }
    }

    /// Recomputes from the store and refreshes the cache.
    pub async fn resync(&self, category: Category) -> KeptList {
        let kept = self.recompute(category).await;
        self.write_cache(category, &kept).await;
        kept
    }

    /// Read path: cached list when available, otherwise a fresh computation.
    pub async fn kept(&self, category: Category) -> KeptList {
        match self.read_cache(category).await {
            Some(mut kept) => {
                kept.truncate(self.config.limit);
                kept
            }
            None => self.recompute(category).await,
        }
    }

    async fn read_cache(&self, category: Category) -> Option<KeptList> {
        let raw = match self.cache.get(category.cache_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", category);
                return None;
            }
            Err(e) => {
                if self.cache.is_enabled() {
                    warn!("Cache read for {} failed: {}", category, e);
                }
                return None;
            }
        };

        match serde_json::from_str::<KeptList>(&raw) {
            Ok(kept) => Some(kept),
            Err(e) => {
                warn!("Cached {} list is unreadable: {}", category, e);
                None
            }
        }
    }

    async fn write_cache(&self, category: Category, kept: &KeptList) {
        if !self.cache.is_enabled() {
            return;
        }
        let payload = match serde_json::to_string(kept) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {} list: {}", category, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(category.cache_key(), &payload).await {
            warn!("Cache sync for {} failed: {}", category, e);
        }
    }
}

#[cfg(test)]
mod tests;
