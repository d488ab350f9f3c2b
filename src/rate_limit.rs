//! Sliding-window rate limiter
//!
//! Counts requests per client identity and endpoint family over a trailing
//! time window, backed by the store's atomic sorted-set pipeline. The
//! current request is always recorded, even when rejected, so a rejected
//! burst keeps the window saturated instead of leaking through as entries
//! age out.
//!
//! Client identities are hashed before they touch the backing store; raw
//! addresses are never persisted. If the store is unreachable the limiter
//! fails open: a rate limiter must never become a single point of failure
//! for the service it protects.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::CacheLayer;
use crate::traits::{CacheStore, bounded};

/// Path segments used to group endpoints into one shared budget
const PATH_GROUP_DEPTH: usize = 2;

/// Per-limiter settings
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Length of the trailing window
    pub window: Duration,
    /// Request budget per window
    pub requests_per_window: u64,
    /// Upper bound on the store pipeline; elapse fails open
    pub op_timeout: Duration,
}

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// The configured budget, echoed for response headers
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Hint for rejected callers; zero when allowed
    pub retry_after_secs: u64,
}

/// Sliding-window rate limiter over the backing store
pub struct SlidingWindowRateLimiter {
    store: Arc<dyn CacheStore>,
    config: RateLimiterConfig,
}

impl SlidingWindowRateLimiter {
    /// Create a limiter using the layer's store and configured defaults
    pub fn new(layer: &Arc<CacheLayer>) -> Self {
        let config = layer.config();
        Self {
            store: Arc::clone(layer.store()),
            config: RateLimiterConfig {
                window: config.rate_limit_window,
                requests_per_window: config.rate_limit_requests,
                op_timeout: config.op_timeout,
            },
        }
    }

    /// Create a limiter with explicit limits over any store
    pub fn with_config(store: Arc<dyn CacheStore>, config: RateLimiterConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    /// Check the current request against the window.
    ///
    /// `forwarded_for` is the raw forwarding header chain if present (first
    /// hop wins); `peer_addr` is the direct connection fallback; `path` is
    /// the request path, grouped to its first segments so endpoint families
    /// share one budget.
    pub async fn check(
        &self,
        forwarded_for: Option<&str>,
        peer_addr: &str,
        path: &str,
    ) -> RateLimitDecision {
        self.check_at(forwarded_for, peer_addr, path, SystemTime::now())
            .await
    }

    /// Same as [`check`](Self::check) with an explicit clock, for
    /// deterministic tests.
    pub async fn check_at(
        &self,
        forwarded_for: Option<&str>,
        peer_addr: &str,
        path: &str,
        now: SystemTime,
    ) -> RateLimitDecision {
        let identity = client_identity(forwarded_for, peer_addr);
        let key = format!(
            "rate_limit:{}:{}",
            identity_hash(&identity),
            path_group(path)
        );

        let pipeline = self.store.sliding_window(&key, self.config.window, now);
        match bounded(self.config.op_timeout, pipeline).await {
            Ok(count) => self.decide(&key, count),
            Err(e) => {
                // Fail open: availability over strictness
                warn!(key = %key, error = %e, "Rate limit check failed, allowing request");
                RateLimitDecision {
                    allowed: true,
                    limit: self.config.requests_per_window,
                    remaining: self.config.requests_per_window,
                    retry_after_secs: 0,
                }
            }
        }
    }

    /// Decide from the pre-add count returned by the pipeline
    fn decide(&self, key: &str, count: u64) -> RateLimitDecision {
        let limit = self.config.requests_per_window;
        let allowed = count < limit;

        if allowed {
            debug!(key = %key, count = count, limit = limit, "Request allowed");
        } else {
            debug!(key = %key, count = count, limit = limit, "Request rejected");
        }

        RateLimitDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(count + 1),
            retry_after_secs: if allowed { 0 } else { self.config.window.as_secs() },
        }
    }
}

/// First hop of the forwarding chain, falling back to the peer address
fn client_identity(forwarded_for: Option<&str>, peer_addr: &str) -> String {
    forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .unwrap_or(peer_addr)
        .to_string()
}

/// Irreversible fixed-width digest of a client identity
fn identity_hash(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Fixed-depth prefix of the request path, so endpoint families are limited
/// independently under one shared budget
fn path_group(path: &str) -> String {
    let group: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .take(PATH_GROUP_DEPTH)
        .collect();

    if group.is_empty() {
        "root".to_string()
    } else {
        group.join("/")
    }
}
