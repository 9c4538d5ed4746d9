// Redis-backed kept-list cache
//
// One connection per process, opened on first use. Concurrent first callers
// queue on the mutex and share the outcome of the attempt in flight when
// they arrived, success or failure. A failed connect leaves the slot empty
// so a call made after it settles tries again.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CacheError, CacheStore};
use crate::config::RedisConfig;

const PING_KEY: &str = "docshare:ping";

#[derive(Default)]
struct Slot {
    conn: Option<ConnectionManager>,
    last_failure: Option<ConnectFailure>,
}

#[derive(Debug, Clone)]
enum ConnectFailure {
    Refused(String),
    TimedOut(u64),
}

impl From<ConnectFailure> for CacheError {
    fn from(failure: ConnectFailure) -> Self {
        match failure {
            ConnectFailure::Refused(msg) => CacheError::Connect(msg),
            ConnectFailure::TimedOut(ms) => CacheError::Timeout(ms),
        }
    }
}

pub struct RedisCache {
    client: redis::Client,
    connect_timeout: Duration,
    /// Completed connect attempts. Bumped under the slot lock.
    attempts: AtomicU64,
    slot: Mutex<Slot>,
}

/// Upgrades `redis://` to `rediss://`; other schemes pass through.
pub fn tls_url(url: &str) -> String {
    match url.strip_prefix("redis://") {
        Some(rest) => format!("rediss://{}", rest),
        None => url.to_string(),
    }
}

impl RedisCache {
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let raw = config
            .url
            .as_deref()
            .ok_or_else(|| CacheError::Connect("REDIS_URL is not set".to_string()))?;
        let url = if config.force_tls {
            tls_url(raw)
        } else {
            raw.to_string()
        };

        Ok(Self {
            client: redis::Client::open(url)?,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            attempts: AtomicU64::new(0),
            slot: Mutex::new(Slot::default()),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.conn.as_ref() {
            return Ok(conn.clone());
        }
        // An attempt settled while we waited on the lock; reuse its result.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(failure) = slot.last_failure.clone() {
                return Err(failure.into());
            }
        }

        debug!("Opening Redis connection");
        // Retries are left to the next caller, not the connection manager.
        let manager_config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let outcome = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_connection_manager_with_config(manager_config),
        )
        .await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        let failure = match outcome {
            Ok(Ok(conn)) => {
                info!("Redis connection established");
                slot.conn = Some(conn.clone());
                slot.last_failure = None;
                return Ok(conn);
            }
            Ok(Err(e)) => {
                warn!("Redis connect failed: {}", e);
                ConnectFailure::Refused(e.to_string())
            }
            Err(_) => {
                warn!("Redis connect timed out");
                ConnectFailure::TimedOut(self.connect_timeout.as_millis() as u64)
            }
        };
        slot.last_failure = Some(failure.clone());
        Err(failure.into())
    }

    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.conn.is_some()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.exists::<_, bool>(PING_KEY).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        if self.slot.lock().await.conn.take().is_some() {
            info!("Redis connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_tls_url_rewrite() {
        assert_eq!(tls_url("redis://default:pw@host:6379"), "rediss://default:pw@host:6379");
        assert_eq!(tls_url("rediss://host:6379"), "rediss://host:6379");
        assert_eq!(tls_url("unix:///tmp/redis.sock"), "unix:///tmp/redis.sock");
    }

    #[test]
    fn test_requires_url() {
        assert!(RedisCache::new(&RedisConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_slot_empty() {
        let cache = RedisCache::new(&RedisConfig {
            url: Some("redis://127.0.0.1:1".to_string()),
            force_tls: false,
            connect_timeout_ms: 200,
        })
        .unwrap();

        assert!(cache.get("videos").await.is_err());
        assert!(!cache.is_connected().await);
        // A later call tries again instead of caching the failure.
        assert!(cache.set("videos", "[]").await.is_err());
        assert!(!cache.is_connected().await);
        assert_eq!(cache.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_refused_connect_fails_fast() {
        let cache = RedisCache::new(&RedisConfig {
            url: Some("redis://127.0.0.1:1".to_string()),
            ..RedisConfig::default()
        })
        .unwrap();

        let started = Instant::now();
        assert!(cache.get("videos").await.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_connect() {
        // Accepts at the kernel level but never answers the AUTH handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let cache = Arc::new(
            RedisCache::new(&RedisConfig {
                url: Some(format!("redis://:secret@127.0.0.1:{}", port)),
                force_tls: false,
                connect_timeout_ms: 300,
            })
            .unwrap(),
        );

        let started = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("videos").await })
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(CacheError::Timeout(300))
            ));
        }

        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(cache.connect_attempts(), 1);
        assert!(!cache.is_connected().await);
        drop(listener);
    }
}
