//! Cacheable wrapper
//!
//! Wraps a target operation with read-through caching: serve from the
//! backing store on hit, otherwise invoke the target and store the result.
//! Infrastructure trouble anywhere in the flow degrades to a direct call;
//! the wrapped operation's own result or error always passes through
//! untouched.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::CacheLayer;
use crate::codec::Codec;
use crate::error::CacheError;
use crate::key::{Bindings, KeySpec};
use crate::traits::bounded;

type ConditionFn = dyn Fn(&Bindings) -> bool + Send + Sync;
type UnlessFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// Read-through cache wrapper for one target operation
///
/// Built fluently and reused across invocations:
///
/// ```rust,no_run
/// use cache_gate::{Bindings, Cacheable, CacheLayer};
/// use std::time::Duration;
///
/// # async fn example(layer: std::sync::Arc<CacheLayer>) -> anyhow::Result<()> {
/// let cached_product = Cacheable::<serde_json::Value>::new(&layer)
///     .key_template("product:{product_id}")
///     .ttl(Duration::from_secs(300));
///
/// let product = cached_product
///     .call("get_product", &Bindings::new().with("product_id", 1), || async {
///         anyhow::Ok(serde_json::json!({"id": 1, "price": 899.99}))
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Cacheable<T> {
    layer: Arc<CacheLayer>,
    key: KeySpec,
    ttl: Duration,
    condition: Option<Arc<ConditionFn>>,
    unless: Option<Arc<UnlessFn<T>>>,
    codec: Codec,
}

impl<T> Cacheable<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a wrapper with the layer's defaults: prefix+argument-hash
    /// keys, default TTL, no predicates, layer-level compression setting.
    pub fn new(layer: &Arc<CacheLayer>) -> Self {
        let config = layer.config();
        Self {
            layer: Arc::clone(layer),
            key: KeySpec::Prefix(config.key_prefix.clone()),
            ttl: config.default_ttl,
            condition: None,
            unless: None,
            codec: Codec::new(config.compression, config.compression_min_bytes),
        }
    }

    /// Use an explicit key template with `{name}` placeholders
    #[must_use]
    pub fn key_template(mut self, template: impl Into<String>) -> Self {
        self.key = KeySpec::Template(template.into());
        self
    }

    /// Use `prefix:<argument hash>` keys
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key = KeySpec::Prefix(prefix.into());
        self
    }

    /// Time-to-live for stored values
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Predicate over the call bindings, evaluated before invocation.
    /// When it returns false, caching is bypassed entirely: the target runs
    /// directly and nothing is read, written, or recorded.
    #[must_use]
    pub fn condition(mut self, predicate: impl Fn(&Bindings) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(predicate));
        self
    }

    /// Predicate over the result, evaluated after invocation on the miss
    /// path. When it returns true, the result is not written to the cache.
    #[must_use]
    pub fn unless(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.unless = Some(Arc::new(predicate));
        self
    }

    /// Enable gzip compression for values above the configured threshold
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.codec.compression = true;
        self
    }

    /// Override the size threshold above which values are compressed
    #[must_use]
    pub fn compression_min_bytes(mut self, min_bytes: usize) -> Self {
        self.codec.min_bytes = min_bytes;
        self
    }

    /// Invoke the wrapped operation.
    ///
    /// `method` is the logical name events are recorded under. The target's
    /// own `Result` passes through unchanged; cache infrastructure failures
    /// never surface here.
    pub async fn call<F, Fut, E>(
        &self,
        method: &str,
        bindings: &Bindings,
        compute: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // Condition false: execute normally, record nothing
        if let Some(condition) = &self.condition
            && !condition(bindings)
        {
            debug!(method = %method, "Cache condition not met, bypassing cache");
            return compute().await;
        }

        let key = match self.key.resolve(&[bindings]) {
            Ok(key) => key,
            Err(e) => {
                // Recoverable: execute uncached
                warn!(method = %method, error = %e, "Cache key resolution failed, executing uncached");
                return compute().await;
            }
        };

        let stats = self.layer.stats();
        let op_timeout = self.layer.config().op_timeout;
        let lookup_started = Instant::now();

        match bounded(op_timeout, self.layer.store().get(&key)).await {
            Ok(Some(bytes)) => match self.codec.decode::<T>(&bytes) {
                Ok(value) => {
                    stats.record_hit(method, &key, lookup_started.elapsed());
                    debug!(method = %method, key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    // Undecodable entry is a miss; the write below replaces it
                    let err = CacheError::Serialization(e);
                    warn!(method = %method, key = %key, kind = err.kind(), error = %err, "Cached value failed to decode, treating as miss");
                }
            },
            Ok(None) => {}
            Err(e) => {
                // Store unreachable: run the target and skip the write,
                // the caller must never see this failure
                let err = CacheError::Store(e);
                stats.record_error(method, &err.to_string());
                warn!(method = %method, key = %key, kind = err.kind(), error = %err, "Cache read failed, executing uncached");
                return compute().await;
            }
        }

        // Miss path: invoke the target and measure it
        let compute_started = Instant::now();
        let value = compute().await?;
        let elapsed = compute_started.elapsed();

        let skip_write = self.unless.as_ref().is_some_and(|unless| unless(&value));
        if skip_write {
            debug!(method = %method, key = %key, "Unless predicate matched, skipping cache write");
            stats.record_miss(method, None, elapsed);
            return Ok(value);
        }

        match self.codec.encode(&value) {
            Ok(bytes) => match bounded(
                op_timeout,
                self.layer.store().set_with_ttl(&key, &bytes, self.ttl),
            )
            .await
            {
                Ok(()) => {
                    stats.record_miss(method, Some(&key), elapsed);
                    debug!(method = %method, key = %key, ttl_secs = %self.ttl.as_secs(), "Cached result");
                }
                Err(e) => {
                    let err = CacheError::Store(e);
                    stats.record_miss(method, None, elapsed);
                    stats.record_error(method, &err.to_string());
                    warn!(method = %method, key = %key, kind = err.kind(), error = %err, "Cache write failed, result served uncached");
                }
            },
            Err(e) => {
                // Non-fatal: the result is still returned, just not cached
                let err = CacheError::Serialization(e);
                stats.record_miss(method, None, elapsed);
                warn!(method = %method, key = %key, kind = err.kind(), error = %err, "Result not serializable, skipping cache write");
            }
        }

        Ok(value)
    }
}
