//! Process-wide cache configuration
//!
//! Built once at startup (typically via [`CacheConfig::from_env`]) and read
//! thereafter. Per-wrapper options (TTL, key template, compression) override
//! these defaults at wrap time.

use std::time::Duration;

/// Configuration for the cache layer and rate limiter defaults
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL applied when a `Cacheable` wrapper does not set one
    pub default_ttl: Duration,

    /// Default key prefix for prefix+argument-hash keys
    pub key_prefix: String,

    /// Whether values above `compression_min_bytes` are gzip-compressed
    pub compression: bool,

    /// Minimum encoded size before compression kicks in
    pub compression_min_bytes: usize,

    /// Upper bound on any single backing-store operation. An elapsed
    /// timeout is treated like a store failure: fall through for the cache
    /// wrappers, fail open for the rate limiter.
    pub op_timeout: Duration,

    /// Whether the stats collector records events (reads always work)
    pub stats_enabled: bool,

    /// Capacity of the recent-operations ring buffer
    pub recent_capacity: usize,

    /// Default sliding-window length for rate limiting
    pub rate_limit_window: Duration,

    /// Default request budget per window
    pub rate_limit_requests: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            key_prefix: "cache".to_string(),
            compression: false,
            compression_min_bytes: 1024,
            op_timeout: Duration::from_secs(5),
            stats_enabled: true,
            recent_capacity: 1000,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_requests: 100,
        }
    }
}

impl CacheConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables:
    /// - `CACHE_DEFAULT_TTL_SECS`
    /// - `CACHE_KEY_PREFIX`
    /// - `CACHE_COMPRESSION` ("1"/"true" to enable)
    /// - `CACHE_COMPRESSION_MIN_BYTES`
    /// - `CACHE_OP_TIMEOUT_MS`
    /// - `CACHE_STATS_ENABLED` ("0"/"false" to disable)
    /// - `CACHE_RECENT_CAPACITY`
    /// - `RATE_LIMIT_WINDOW_SECS`
    /// - `RATE_LIMIT_REQUESTS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_ttl: env_secs("CACHE_DEFAULT_TTL_SECS").unwrap_or(defaults.default_ttl),
            key_prefix: std::env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            compression: env_bool("CACHE_COMPRESSION").unwrap_or(defaults.compression),
            compression_min_bytes: env_parse("CACHE_COMPRESSION_MIN_BYTES")
                .unwrap_or(defaults.compression_min_bytes),
            op_timeout: env_millis("CACHE_OP_TIMEOUT_MS").unwrap_or(defaults.op_timeout),
            stats_enabled: env_bool("CACHE_STATS_ENABLED").unwrap_or(defaults.stats_enabled),
            recent_capacity: env_parse("CACHE_RECENT_CAPACITY").unwrap_or(defaults.recent_capacity),
            rate_limit_window: env_secs("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_requests: env_parse("RATE_LIMIT_REQUESTS")
                .unwrap_or(defaults.rate_limit_requests),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
