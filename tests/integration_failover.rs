//! Failure-isolation tests
//!
//! A backing-store outage must never fail a wrapped operation: the cache
//! wrappers fall through to direct invocation and the rate limiter fails
//! open.

mod common;

use cache_gate::{Bindings, CacheEvict, Cacheable, RateLimiterConfig, SlidingWindowRateLimiter};
use common::*;
use std::sync::Arc;
use std::time::Duration;

/// A cacheable call over a dead store still returns the target's result
#[tokio::test]
async fn test_cacheable_falls_through_on_store_outage() {
    let layer = setup_failing_layer();
    let cached = Cacheable::<test_data::Product>::new(&layer)
        .key_template("product:{product_id}")
        .ttl(Duration::from_secs(300));

    let product = cached
        .call("get_product", &Bindings::new().with("product_id", 1), || async {
            anyhow::Ok(test_data::Product::new(1))
        })
        .await
        .unwrap();

    assert_eq!(product, test_data::Product::new(1));

    let method = layer.stats().method_stats("get_product").unwrap();
    assert!(method.errors >= 1, "store failure is reflected in error counters");
}

/// An eviction over a dead store does not fail the wrapped write
#[tokio::test]
async fn test_evict_swallows_store_outage() {
    let layer = setup_failing_layer();
    let evict = CacheEvict::<()>::exact_keys(&layer, ["product:{product_id}"]);

    evict
        .call("update_product", &Bindings::new().with("product_id", 1), || async {
            anyhow::Ok(())
        })
        .await
        .unwrap();

    let method = layer.stats().method_stats("update_product").unwrap();
    assert_eq!(method.errors, 1);
    assert_eq!(layer.stats().global_stats().total_evictions, 0);
}

/// The rate limiter fails open with the full quota reported
#[tokio::test]
async fn test_rate_limiter_fails_open() {
    let layer = setup_failing_layer();
    let limiter = SlidingWindowRateLimiter::with_config(
        Arc::clone(layer.store()),
        RateLimiterConfig {
            window: Duration::from_secs(60),
            requests_per_window: 3,
            op_timeout: Duration::from_secs(5),
        },
    );

    for _ in 0..10 {
        let decision = limiter.check(None, "10.0.0.2", "/api/products").await;
        assert!(decision.allowed, "outage must not reject requests");
        assert_eq!(decision.remaining, 3, "full quota reported while failing open");
        assert_eq!(decision.retry_after_secs, 0);
    }
}

/// A write failure after a successful compute still serves the result and
/// is recorded as a miss plus an error
#[tokio::test]
async fn test_write_failure_serves_result_uncached() {
    let layer = cache_gate::CacheLayer::with_store(
        Arc::new(ReadOnlyStore(cache_gate::MemoryStore::new())),
        cache_gate::CacheConfig::default(),
    );
    let cached = Cacheable::<serde_json::Value>::new(&layer).key_template("product:{product_id}");

    for _ in 0..2 {
        let value = cached
            .call("get_product", &Bindings::new().with("product_id", 2), || async {
                anyhow::Ok(test_data::json_product(2))
            })
            .await
            .unwrap();
        assert_eq!(value["id"], 2);
    }

    let method = layer.stats().method_stats("get_product").unwrap();
    assert_eq!(method.misses, 2, "nothing was ever cached");
    assert_eq!(method.errors, 2, "each failed write is counted");
    assert_eq!(method.hits, 0);
}

/// A store that hangs instead of erroring hits the operation timeout; the
/// wrapped call still completes with the target's result
#[tokio::test]
async fn test_cacheable_times_out_on_hung_store() {
    let layer = setup_hanging_layer();
    let cached = Cacheable::<test_data::Product>::new(&layer)
        .key_template("product:{product_id}")
        .ttl(Duration::from_secs(300));

    let started = std::time::Instant::now();
    let product = cached
        .call("get_product", &Bindings::new().with("product_id", 1), || async {
            anyhow::Ok(test_data::Product::new(1))
        })
        .await
        .unwrap();

    assert_eq!(product, test_data::Product::new(1));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "a hung read must not block the caller"
    );

    let method = layer.stats().method_stats("get_product").unwrap();
    assert!(method.errors >= 1, "the elapsed timeout is counted as a store error");
}

/// A hung store does not block an eviction either
#[tokio::test]
async fn test_evict_times_out_on_hung_store() {
    let layer = setup_hanging_layer();
    let evict = CacheEvict::<()>::exact_keys(&layer, ["product:{product_id}"]);

    let started = std::time::Instant::now();
    evict
        .call("update_product", &Bindings::new().with("product_id", 1), || async {
            anyhow::Ok(())
        })
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    let method = layer.stats().method_stats("update_product").unwrap();
    assert_eq!(method.errors, 1);
    assert_eq!(layer.stats().global_stats().total_evictions, 0);
}

/// A hung pipeline fails the rate limiter open within the timeout
#[tokio::test]
async fn test_rate_limiter_times_out_open_on_hung_store() {
    let layer = setup_hanging_layer();
    let limiter = SlidingWindowRateLimiter::new(&layer);

    let started = std::time::Instant::now();
    let decision = limiter.check(None, "10.0.0.2", "/api/products").await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(decision.allowed, "a hung store must not reject requests");
    assert_eq!(decision.retry_after_secs, 0);
}

/// Health check reports the outage
#[tokio::test]
async fn test_health_check_reports_outage() {
    assert!(!setup_failing_layer().health_check().await);
    assert!(setup_layer().health_check().await);
}
