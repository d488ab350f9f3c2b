//! Redis backing store
//!
//! Redis-based backing store with `ConnectionManager` for automatic
//! reconnection. Pattern deletion uses cursor-based SCAN (never KEYS), and
//! the sliding-window update runs as one atomic MULTI/EXEC pipeline.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::traits::CacheStore;
use async_trait::async_trait;

/// Redis backing store
///
/// Provides:
/// - Shared storage across service instances
/// - Automatic reconnection via `ConnectionManager`
/// - SCAN-based pattern deletion with accurate removal counts
/// - Atomic sorted-set pipelines for sliding-window rate limiting
pub struct RedisStore {
    /// Redis connection manager - handles reconnection automatically
    conn_manager: ConnectionManager,
    /// Disambiguates sorted-set members added within the same millisecond
    window_seq: AtomicU64,
}

impl RedisStore {
    /// Create a new Redis store from the `REDIS_URL` environment variable
    /// (default `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or the
    /// connection fails.
    pub async fn new() -> Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Create a new Redis store with a custom connection URL
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or the
    /// connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis store with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        // Test connection
        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis store connected (ConnectionManager enabled)");

        Ok(Self {
            conn_manager,
            window_seq: AtomicU64::new(0),
        })
    }

    /// Scan keys matching a glob-style pattern via cursor-based SCAN.
    ///
    /// Safe for production use, unlike the blocking KEYS command.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let result: (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .context("Redis SCAN failed")?;

            cursor = result.0;
            keys.extend(result.1);

            // Cursor 0 means iteration is complete
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, count = keys.len(), "[Redis] Scanned keys matching pattern");
        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.context("Redis GET failed")?;
        Ok(value.filter(|bytes| !bytes.is_empty()))
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .context("Redis SETEX failed")?;
        debug!(key = %key, ttl_secs = %ttl_secs, "[Redis] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let removed: usize = conn.del(key).await.context("Redis DEL failed")?;
        Ok(removed > 0)
    }

    async fn remove_pattern(&self, pattern: &str) -> Result<usize> {
        // Enumerate first so the removal count is exact; the extra round
        // trip buys accurate eviction statistics.
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn_manager.clone();
        let removed: usize = conn.del(&keys).await.context("Redis bulk DEL failed")?;
        debug!(pattern = %pattern, count = removed, "[Redis] Removed keys matching pattern");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn.exists(key).await.context("Redis EXISTS failed")?;
        Ok(exists)
    }

    async fn sliding_window(&self, key: &str, window: Duration, now: SystemTime) -> Result<u64> {
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        let cutoff_ms = now_ms.saturating_sub(window.as_millis() as u64);
        let expiry_secs = (window.as_secs() * 2).max(1);

        let mut conn = self.conn_manager.clone();
        let mut pipe = Pipeline::new();
        pipe.atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            // Exclusive bound: a member scored exactly at the window edge
            // is still inside the window
            .arg(format!("({cutoff_ms}"))
            .cmd("ZCARD")
            .arg(key)
            .cmd("ZADD")
            .arg(key)
            .arg(now_ms)
            // Member carries the timestamp plus a sequence suffix so two
            // requests landing in the same millisecond both count
            .arg(format!(
                "{now_ms}-{}",
                self.window_seq.fetch_add(1, Ordering::Relaxed)
            ))
            .cmd("EXPIRE")
            .arg(key)
            .arg(expiry_secs);

        let (_purged, count, _added, _expired): (u64, u64, u64, u64) = pipe
            .query_async(&mut conn)
            .await
            .context("Redis sliding-window pipeline failed")?;

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn_manager.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        matches!(pong.as_deref(), Ok("PONG"))
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
