//! Backing Store Adapter trait
//!
//! The whole subsystem talks to its key-value store through one trait so that
//! the Redis backend can be swapped for the in-memory backend (tests, local
//! development) or a custom implementation.
//!
//! # Example: Custom Store
//!
//! ```rust,ignore
//! use cache_gate::{CacheStore, async_trait};
//! use std::time::{Duration, SystemTime};
//! use anyhow::Result;
//!
//! struct MyStore { /* ... */ }
//!
//! #[async_trait]
//! impl CacheStore for MyStore {
//!     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
//!         // Your implementation
//!     }
//!     // ... remaining methods
//! }
//! ```

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Key-value store with TTL, pattern deletion and an atomic sliding-window
/// pipeline.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; every method may be called from
/// many concurrent tasks sharing one instance.
///
/// # Failure Semantics
///
/// Errors returned here never reach a wrapped operation's caller. The cache
/// wrappers log them, count them, and fall through to direct invocation; the
/// rate limiter fails open.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get raw value bytes by key.
    ///
    /// Returns `Ok(None)` when the key is absent or expired; `Err` only for
    /// store-level failures (connection, timeout, protocol).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store raw value bytes under `key` with a time-to-live.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove a single key. Returns whether a key was actually removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every key matching a glob-style pattern (`*`, `?`).
    ///
    /// Returns the number of keys actually removed so eviction statistics
    /// stay accurate for pattern deletes.
    async fn remove_pattern(&self, pattern: &str) -> Result<usize>;

    /// Check whether a key currently exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Execute the sliding-window update for `key` as one atomic unit:
    ///
    /// 1. purge members scored before `now - window`
    /// 2. count the remaining members
    /// 3. add a member scored at `now`
    /// 4. refresh the key's expiry to `2 * window`
    ///
    /// Returns the count taken in step 2, before the current request was
    /// added. No partial application of the four steps may be observable by
    /// a concurrent caller.
    async fn sliding_window(&self, key: &str, window: Duration, now: SystemTime) -> Result<u64>;

    /// Check if the store is reachable and operational.
    async fn health_check(&self) -> bool;

    /// Name of this backend for logging and debugging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Run a store operation with an upper bound on its duration.
///
/// An elapsed timeout is reported as an ordinary store failure, so callers
/// handle a hung store (accepts connections, never responds) exactly like a
/// refused one.
pub(crate) async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "store operation timed out after {}ms",
            limit.as_millis()
        )),
    }
}
