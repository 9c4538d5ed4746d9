use super::*;
use crate::cache::{DisabledCache, MemoryCache};
use crate::storage::MemoryStore;
use chrono::{DateTime, TimeZone, Utc};

const BASE: &str = "https://blob.test";

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn engine(store: &MemoryStore, cache: &MemoryCache) -> RetentionEngine {
    RetentionEngine::new(
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        RetentionConfig::default(),
    )
}

fn pathnames(items: &[MediaItem]) -> Vec<&str> {
    items.iter().map(|i| i.pathname.as_str()).collect()
}

fn is_newest_first(items: &[MediaItem]) -> bool {
    items.windows(2).all(|w| w[0].created_at >= w[1].created_at)
}

async fn seed_videos(store: &MemoryStore, count: i64) {
    for n in 0..count {
        store
            .insert(&format!("videos/clip-{}.mp4", n), 100 + n as u64, at(n))
            .await;
    }
}

#[test]
fn test_plan_splits_at_limit() {
    let policy = Category::Video.policy(&RetentionConfig::default());
    let objects = (0..5)
        .map(|n| StoredObject {
            url: format!("{}/videos/{}.mp4", BASE, n),
            pathname: format!("videos/{}.mp4", n),
            size: 1,
            uploaded_at: at(n),
        })
        .collect();

    let plan = plan(&policy, objects);
    assert_eq!(pathnames(&plan.kept), ["videos/4.mp4", "videos/3.mp4", "videos/2.mp4"]);
    assert_eq!(pathnames(&plan.removed), ["videos/1.mp4", "videos/0.mp4"]);
}

#[test]
fn test_plan_ignores_foreign_paths() {
    let policy = Category::Video.policy(&RetentionConfig::default());
    let objects = vec![
        StoredObject {
            url: format!("{}/videos/notes.txt", BASE),
            pathname: "videos/notes.txt".to_string(),
            size: 1,
            uploaded_at: at(9),
        },
        StoredObject {
            url: format!("{}/videos/a.webm", BASE),
            pathname: "videos/a.webm".to_string(),
            size: 1,
            uploaded_at: at(1),
        },
    ];

    let plan = plan(&policy, objects);
    assert_eq!(pathnames(&plan.kept), ["videos/a.webm"]);
    assert!(plan.removed.is_empty());
}

#[test]
fn test_plan_with_zero_limit_removes_everything() {
    let config = RetentionConfig {
        limit: 0,
        ..RetentionConfig::default()
    };
    let policy = Category::Archive.policy(&config);
    let objects = vec![StoredObject {
        url: format!("{}/archives/a.zip", BASE),
        pathname: "archives/a.zip".to_string(),
        size: 1,
        uploaded_at: at(1),
    }];

    let plan = plan(&policy, objects);
    assert!(plan.kept.is_empty());
    assert_eq!(plan.removed.len(), 1);
}

#[tokio::test]
async fn test_reconcile_keeps_min_of_limit_and_total() {
    for total in 0..6 {
        let store = MemoryStore::new(BASE);
        let cache = MemoryCache::new();
        seed_videos(&store, total).await;

        let kept = engine(&store, &cache).reconcile(Category::Video).await;
        assert_eq!(kept.len(), (total as usize).min(3));
        assert!(is_newest_first(&kept));
        assert_eq!(store.len().await, kept.len());
    }
}

#[tokio::test]
async fn test_fourth_upload_evicts_exactly_the_oldest() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 3).await;
    engine.reconcile(Category::Video).await;

    store.insert("videos/clip-3.mp4", 1, at(3)).await;
    let kept = engine.reconcile(Category::Video).await;

    assert_eq!(store.delete_count(), 1);
    assert!(!store.contains("videos/clip-0.mp4").await);
    assert_eq!(
        pathnames(&kept),
        ["videos/clip-3.mp4", "videos/clip-2.mp4", "videos/clip-1.mp4"]
    );
}

#[tokio::test]
async fn test_reconcile_writes_cache() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 4).await;

    let kept = engine(&store, &cache).reconcile(Category::Video).await;
    let cached: KeptList = serde_json::from_str(&cache.peek("videos").await.unwrap()).unwrap();
    assert_eq!(cached, kept);
    assert_eq!(cache.peek("archives").await, None);
}

#[tokio::test]
async fn test_reconcile_leaves_other_categories_alone() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 5).await;
    for n in 0..5 {
        store.insert(&format!("archives/{}.zip", n), 1, at(n)).await;
    }

    engine(&store, &cache).reconcile(Category::Video).await;
    assert_eq!(store.list("archives/").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_failed_delete_does_not_block_others() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 6).await;
    store.fail_delete_of("videos/clip-1.mp4").await;

    let kept = engine(&store, &cache).reconcile(Category::Video).await;

    assert_eq!(kept.len(), 3);
    assert_eq!(store.delete_count(), 2);
    assert!(store.contains("videos/clip-1.mp4").await);
    assert!(!store.contains("videos/clip-0.mp4").await);
    assert!(!store.contains("videos/clip-2.mp4").await);
}

#[tokio::test]
async fn test_cache_write_failure_is_swallowed() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    cache.set_unavailable(true);
    seed_videos(&store, 4).await;

    let kept = engine(&store, &cache).reconcile(Category::Video).await;
    assert_eq!(kept.len(), 3);
    assert_eq!(store.delete_count(), 1);
    assert_eq!(cache.peek("videos").await, None);
}

#[tokio::test]
async fn test_listing_failure_yields_empty_and_deletes_nothing() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 5).await;
    store.set_fail_list(true);

    let engine = engine(&store, &cache);
    assert!(engine.reconcile(Category::Video).await.is_empty());
    assert!(engine.recompute(Category::Video).await.is_empty());
    assert_eq!(store.delete_count(), 0);
}

#[tokio::test]
async fn test_deleted_item_never_returns() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 5).await;

    let kept = engine.reconcile(Category::Video).await;
    for victim in kept {
        store.delete(&victim.url).await.unwrap();
        let after = engine.reconcile(Category::Video).await;
        assert!(after.iter().all(|item| item.url != victim.url));
        let read = engine.kept(Category::Video).await;
        assert!(read.iter().all(|item| item.url != victim.url));
    }
}

#[tokio::test]
async fn test_read_prefers_cache() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 2).await;
    engine.reconcile(Category::Video).await;

    // Out-of-band upload is not visible until the next reconcile.
    store.insert("videos/late.mp4", 1, at(50)).await;
    let read = engine.kept(Category::Video).await;
    assert_eq!(read.len(), 2);
    assert!(read.iter().all(|item| item.pathname != "videos/late.mp4"));
}

#[tokio::test]
async fn test_read_without_cache_matches_recompute() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 5).await;
    cache.set_unavailable(true);

    let read = engine.kept(Category::Video).await;
    assert_eq!(read, engine.recompute(Category::Video).await);
    assert_eq!(read.len(), 3);
    // The read path never deletes.
    assert_eq!(store.delete_count(), 0);
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn test_disabled_cache_reads_from_store() {
    let store = MemoryStore::new(BASE);
    seed_videos(&store, 2).await;
    let engine = RetentionEngine::new(
        Arc::new(store.clone()),
        Arc::new(DisabledCache),
        RetentionConfig::default(),
    );

    assert_eq!(engine.kept(Category::Video).await.len(), 2);
    assert_eq!(engine.reconcile(Category::Video).await.len(), 2);
}

#[tokio::test]
async fn test_unreadable_cache_falls_back() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 1).await;
    cache.set("videos", "not json").await.unwrap();

    assert_eq!(engine.kept(Category::Video).await.len(), 1);
}

#[tokio::test]
async fn test_cached_list_is_capped_at_limit() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 5).await;
    let wide = RetentionEngine::new(
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        RetentionConfig {
            limit: 5,
            ..RetentionConfig::default()
        },
    );
    wide.resync(Category::Video).await;

    let kept = engine(&store, &cache).kept(Category::Video).await;
    assert_eq!(kept.len(), 3);
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    let engine = engine(&store, &cache);
    seed_videos(&store, 4).await;

    let first = engine.kept(Category::Video).await;
    let second = engine.kept(Category::Video).await;
    assert_eq!(first, second);

    engine.reconcile(Category::Video).await;
    assert_eq!(engine.kept(Category::Video).await, engine.kept(Category::Video).await);
}

#[tokio::test]
async fn test_resync_does_not_delete() {
    let store = MemoryStore::new(BASE);
    let cache = MemoryCache::new();
    seed_videos(&store, 5).await;

    let kept = engine(&store, &cache).resync(Category::Video).await;
    assert_eq!(kept.len(), 3);
    assert_eq!(store.len().await, 5);
    assert!(cache.peek("videos").await.is_some());
}
