//! Cache-evict wrapper
//!
//! Wraps a target operation to remove cache keys before or after it
//! executes, by exact key list or by glob pattern. Eviction failures are
//! logged and counted, never surfaced to the wrapped operation's caller.
//! A `Cacheable` and a `CacheEvict` wrapping the same operation apply their
//! contracts independently; there is no transaction between them.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::CacheLayer;
use crate::error::CacheError;
use crate::key::{Bindings, resolve_template};
use crate::traits::bounded;

type ResultConditionFn<T> = dyn Fn(&T) -> bool + Send + Sync;
type ResultBindingsFn<T> = dyn Fn(&T) -> Bindings + Send + Sync;

/// How keys are selected for eviction
#[derive(Debug, Clone)]
pub enum EvictStrategy {
    /// Resolve each template and delete the resulting keys individually
    ExactKeys(Vec<String>),
    /// Resolve one template into a glob pattern and delete every match
    Pattern(String),
}

/// Eviction wrapper for one target operation
///
/// ```rust,no_run
/// use cache_gate::{Bindings, CacheEvict, CacheLayer};
///
/// # async fn example(layer: std::sync::Arc<CacheLayer>) -> anyhow::Result<()> {
/// let evict_product = CacheEvict::<()>::exact_keys(&layer, ["product:{product_id}"]);
///
/// evict_product
///     .call("update_product", &Bindings::new().with("product_id", 1), || async {
///         // write to the database
///         anyhow::Ok(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CacheEvict<T> {
    layer: Arc<CacheLayer>,
    strategy: EvictStrategy,
    before_invocation: bool,
    condition: Option<Arc<ResultConditionFn<T>>>,
    result_bindings: Option<Arc<ResultBindingsFn<T>>>,
}

impl<T> CacheEvict<T> {
    /// Evict an explicit list of key templates
    pub fn exact_keys<I, S>(layer: &Arc<CacheLayer>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_strategy(
            layer,
            EvictStrategy::ExactKeys(keys.into_iter().map(Into::into).collect()),
        )
    }

    /// Evict every key matching a glob pattern template
    pub fn pattern(layer: &Arc<CacheLayer>, pattern: impl Into<String>) -> Self {
        Self::with_strategy(layer, EvictStrategy::Pattern(pattern.into()))
    }

    pub fn with_strategy(layer: &Arc<CacheLayer>, strategy: EvictStrategy) -> Self {
        Self {
            layer: Arc::clone(layer),
            strategy,
            before_invocation: false,
            condition: None,
            result_bindings: None,
        }
    }

    /// Evict before the target runs instead of after.
    ///
    /// Before-mode eviction always happens, regardless of the target's
    /// outcome; result-based options do not apply.
    #[must_use]
    pub fn before_invocation(mut self) -> Self {
        self.before_invocation = true;
        self
    }

    /// Predicate over the result deciding whether after-mode eviction
    /// happens at all
    #[must_use]
    pub fn condition(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(predicate));
        self
    }

    /// Derive extra template bindings from the result, so after-mode key
    /// templates may reference result fields in addition to call arguments
    #[must_use]
    pub fn result_bindings(mut self, f: impl Fn(&T) -> Bindings + Send + Sync + 'static) -> Self {
        self.result_bindings = Some(Arc::new(f));
        self
    }

    /// Invoke the wrapped operation, evicting per configuration.
    ///
    /// The target's own `Result` passes through unchanged.
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
        if self.before_invocation {
            self.evict(method, &[bindings]).await;
            return compute().await;
        }

        let value = compute().await?;

        let should_evict = self
            .condition
            .as_ref()
            .is_none_or(|condition| condition(&value));
        if should_evict {
            let extra = self.result_bindings.as_ref().map(|f| f(&value));
            match &extra {
                Some(extra) => self.evict(method, &[bindings, extra]).await,
                None => self.evict(method, &[bindings]).await,
            }
        } else {
            debug!(method = %method, "Evict condition not met, keeping cache entries");
        }

        Ok(value)
    }

    /// Resolve and delete keys per the configured strategy.
    ///
    /// Each successful deletion is recorded with the number of keys
    /// actually removed; pattern deletes count matches, not 1.
    async fn evict(&self, method: &str, sources: &[&Bindings]) {
        let stats = self.layer.stats();
        let op_timeout = self.layer.config().op_timeout;

        match &self.strategy {
            EvictStrategy::ExactKeys(templates) => {
                for template in templates {
                    let key = match resolve_template(template, sources) {
                        Ok(key) => key,
                        Err(e) => {
                            warn!(method = %method, error = %e, "Evict key resolution failed, skipping key");
                            continue;
                        }
                    };

                    match bounded(op_timeout, self.layer.store().remove(&key)).await {
                        Ok(true) => {
                            stats.record_eviction(Some(method), &key, 1);
                            debug!(method = %method, key = %key, "Evicted cache key");
                        }
                        Ok(false) => {
                            debug!(method = %method, key = %key, "Evict key was not present");
                        }
                        Err(e) => {
                            let err = CacheError::Store(e);
                            stats.record_error(method, &err.to_string());
                            warn!(method = %method, key = %key, kind = err.kind(), error = %err, "Cache eviction failed");
                        }
                    }
                }
            }
            EvictStrategy::Pattern(template) => {
                let pattern = match resolve_template(template, sources) {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        warn!(method = %method, error = %e, "Evict pattern resolution failed, skipping eviction");
                        return;
                    }
                };

                match bounded(op_timeout, self.layer.store().remove_pattern(&pattern)).await {
                    Ok(0) => {
                        debug!(method = %method, pattern = %pattern, "Evict pattern matched no keys");
                    }
                    Ok(removed) => {
                        stats.record_eviction(Some(method), &pattern, removed as u64);
                        debug!(method = %method, pattern = %pattern, count = removed, "Evicted keys matching pattern");
                    }
                    Err(e) => {
                        let err = CacheError::Store(e);
                        stats.record_error(method, &err.to_string());
                        warn!(method = %method, pattern = %pattern, kind = err.kind(), error = %err, "Pattern eviction failed");
                    }
                }
            }
        }
    }
}
