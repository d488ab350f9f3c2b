//! Cache Gate
//!
//! Declarative caching and sliding-window rate limiting over a shared
//! backing store, featuring:
//! - **Cacheable wrapper**: read-through caching with key templating,
//!   conditional predicates, TTL, and optional gzip compression
//! - **Cache-evict wrapper**: exact-key or glob-pattern eviction, before or
//!   after the wrapped operation
//! - **Statistics collector**: per-method hit/miss/error/eviction tracking
//!   with a bounded recent-operations log and serializable snapshots
//! - **Sliding-window rate limiter**: per-client, per-endpoint-family
//!   budgets over an atomic sorted-set pipeline
//! - **Failure isolation**: cache trouble degrades to direct invocation and
//!   the rate limiter fails open; wrapped operations never see
//!   infrastructure errors
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cache_gate::{Bindings, CacheLayer, Cacheable};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Connects to Redis via the REDIS_URL environment variable
//!     let layer = CacheLayer::new().await?;
//!
//!     let cached_product = Cacheable::<serde_json::Value>::new(&layer)
//!         .key_template("product:{product_id}")
//!         .ttl(Duration::from_secs(300));
//!
//!     let product = cached_product
//!         .call("get_product", &Bindings::new().with("product_id", 1), || async {
//!             // Database fetch runs only on a cache miss
//!             anyhow::Ok(serde_json::json!({"id": 1, "price": 899.99}))
//!         })
//!         .await?;
//!
//!     let stats = layer.stats().global_stats();
//!     tracing::info!(hit_rate = stats.hit_rate, "Cache hit rate");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Caller → Cacheable / CacheEvict → Key Resolver → Backing Store
//!               ↓ hit/miss/error/eviction
//!          Stats Collector
//!
//! HTTP layer → SlidingWindowRateLimiter → Backing Store (atomic pipeline)
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub mod backends;
pub mod cacheable;
pub mod codec;
pub mod config;
pub mod error;
pub mod evict;
pub mod key;
pub mod rate_limit;
pub mod stats;
pub mod traits;

pub use backends::MemoryStore;
#[cfg(feature = "redis")]
pub use backends::RedisStore;
pub use cacheable::Cacheable;
pub use codec::Codec;
pub use config::CacheConfig;
pub use error::CacheError;
pub use evict::{CacheEvict, EvictStrategy};
pub use key::{Bindings, KeySpec};
pub use rate_limit::{RateLimitDecision, RateLimiterConfig, SlidingWindowRateLimiter};
pub use stats::{
    CacheStatsCollector, GlobalStats, MethodPerformance, MethodStats, OperationKind,
    RecentOperation, StatsSnapshot,
};
pub use traits::CacheStore;

// Re-export async_trait for custom store implementations
pub use async_trait::async_trait;

/// Shared handle for the caching subsystem
///
/// Owns the backing store, the statistics collector, and the process-wide
/// configuration. Constructed once at startup and injected into every
/// wrapper and limiter; there is no ambient global instance.
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    stats: CacheStatsCollector,
    config: CacheConfig,
}

impl CacheLayer {
    /// Create a layer backed by Redis, configured from the environment
    /// (`REDIS_URL` plus the `CACHE_*` / `RATE_LIMIT_*` variables).
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis connection cannot be established.
    #[cfg(feature = "redis")]
    pub async fn new() -> Result<Arc<Self>> {
        let config = CacheConfig::from_env();
        let store = Arc::new(RedisStore::new().await?);
        Ok(Self::with_store(store, config))
    }

    /// Create a layer backed by Redis at a specific URL
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis connection cannot be established.
    #[cfg(feature = "redis")]
    pub async fn with_redis_url(redis_url: &str, config: CacheConfig) -> Result<Arc<Self>> {
        let store = Arc::new(RedisStore::with_url(redis_url).await?);
        Ok(Self::with_store(store, config))
    }

    /// Create a layer over any [`CacheStore`] implementation
    pub fn with_store(store: Arc<dyn CacheStore>, config: CacheConfig) -> Arc<Self> {
        info!(
            store = store.name(),
            stats_enabled = config.stats_enabled,
            "Initializing cache layer"
        );

        Arc::new(Self {
            stats: CacheStatsCollector::new(config.stats_enabled, config.recent_capacity),
            store,
            config,
        })
    }

    /// Check that the backing store is reachable. A store that does not
    /// answer within the operation timeout is reported as unhealthy.
    pub async fn health_check(&self) -> bool {
        tokio::time::timeout(self.config.op_timeout, self.store.health_check())
            .await
            .unwrap_or(false)
    }

    /// The backing store shared by wrappers and limiters
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// The statistics collector
    pub fn stats(&self) -> &CacheStatsCollector {
        &self.stats
    }

    /// The process-wide configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
