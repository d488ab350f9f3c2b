//! In-memory backing store
//!
//! A `DashMap`-based store implementing the full [`CacheStore`] contract,
//! including glob pattern deletion and atomic sliding windows. It backs the
//! integration tests and works as a dependency-free store for local
//! development; production deployments use [`RedisStore`](super::RedisStore).

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::traits::CacheStore;
use async_trait::async_trait;

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Request timestamps for one rate-limit key
#[derive(Debug, Default)]
struct Window {
    /// Millisecond scores, kept sorted by insertion (time is monotonic here)
    scores: Vec<u64>,
    /// Self-cleaning expiry mirroring the Redis EXPIRE refresh
    expires_at: Option<Instant>,
}

/// Concurrent in-memory store
///
/// Key-value entries live in a `DashMap`; sliding windows live behind one
/// mutex so the purge-count-add-expire sequence is atomic, matching the
/// Redis pipeline's guarantee.
#[derive(Default)]
pub struct MemoryStore {
    map: DashMap<String, Entry>,
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired key-value entries. Expiry is otherwise enforced
    /// lazily on read.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[Memory] Cleaned up expired entries");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Glob matcher supporting `*` (any run) and `?` (any single char)
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative backtracking matcher
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(&c) if Some(&c) == text.get(t) => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    while pattern.get(p) == Some(&'*') {
        p += 1;
    }
    p == pattern.len()
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired() {
                drop(entry); // Release read guard before removal
                self.map.remove(key);
                Ok(None)
            } else {
                Ok(Some(entry.value.clone()))
            }
        } else {
            Ok(None)
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.map
            .insert(key.to_string(), Entry::new(value.to_vec(), ttl));
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[Memory] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.map.remove(key).is_some())
    }

    async fn remove_pattern(&self, pattern: &str) -> Result<usize> {
        let mut removed = 0;
        self.map.retain(|key, _| {
            if glob_match(pattern, key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(pattern = %pattern, count = removed, "[Memory] Removed keys matching pattern");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.map.get(key) {
            Some(entry) if !entry.is_expired() => Ok(true),
            _ => Ok(false),
        }
    }

    async fn sliding_window(&self, key: &str, window: Duration, now: SystemTime) -> Result<u64> {
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        let cutoff_ms = now_ms.saturating_sub(window.as_millis() as u64);

        let mut windows = self.windows.lock();

        // Drop windows whose refresh expiry lapsed (mirrors Redis EXPIRE)
        windows.retain(|_, w| w.expires_at.is_none_or(|at| Instant::now() <= at));

        let entry = windows.entry(key.to_string()).or_default();
        // Scores exactly at the window edge are still inside the window
        entry.scores.retain(|&score| score >= cutoff_ms);
        let count = entry.scores.len() as u64;
        entry.scores.push(now_ms);
        entry.expires_at = Some(Instant::now() + window * 2);

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
