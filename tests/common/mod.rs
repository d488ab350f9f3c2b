//! Common utilities for integration tests
//!
//! Shared infrastructure: layer setup over the in-memory store, unique key
//! generation, test data generators, and failure-mode store stubs
//! (erroring, hanging, read-only) for the failure-isolation tests.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use cache_gate::{CacheConfig, CacheLayer, CacheStore, MemoryStore};
use std::sync::{Arc, Once};
use std::time::{Duration, SystemTime};

static TRACING: Once = Once::new();

/// Route span output through the test harness, honoring `RUST_LOG`
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Initialize a cache layer over the in-memory store
pub fn setup_layer() -> Arc<CacheLayer> {
    init_tracing();
    CacheLayer::with_store(Arc::new(MemoryStore::new()), CacheConfig::default())
}

/// Initialize a cache layer with custom configuration
pub fn setup_layer_with_config(config: CacheConfig) -> Arc<CacheLayer> {
    init_tracing();
    CacheLayer::with_store(Arc::new(MemoryStore::new()), config)
}

/// Initialize a cache layer whose store fails every operation
pub fn setup_failing_layer() -> Arc<CacheLayer> {
    init_tracing();
    CacheLayer::with_store(Arc::new(FailingStore), CacheConfig::default())
}

/// Initialize a cache layer whose store never responds, with a short
/// operation timeout so tests stay fast
pub fn setup_hanging_layer() -> Arc<CacheLayer> {
    init_tracing();
    CacheLayer::with_store(
        Arc::new(HangingStore),
        CacheConfig {
            op_timeout: Duration::from_millis(100),
            ..CacheConfig::default()
        },
    )
}

/// Create a test key with a unique suffix to avoid conflicts between tests
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Store stub simulating a backing-store outage
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(anyhow!("connection refused"))
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn remove(&self, _key: &str) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }

    async fn remove_pattern(&self, _pattern: &str) -> Result<usize> {
        Err(anyhow!("connection refused"))
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }

    async fn sliding_window(
        &self,
        _key: &str,
        _window: Duration,
        _now: SystemTime,
    ) -> Result<u64> {
        Err(anyhow!("connection refused"))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "Failing"
    }
}

/// Store stub simulating a store that accepts connections but never
/// responds (network partition, stuck server)
pub struct HangingStore;

#[async_trait]
impl CacheStore for HangingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        std::future::pending().await
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        std::future::pending().await
    }

    async fn remove(&self, _key: &str) -> Result<bool> {
        std::future::pending().await
    }

    async fn remove_pattern(&self, _pattern: &str) -> Result<usize> {
        std::future::pending().await
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        std::future::pending().await
    }

    async fn sliding_window(
        &self,
        _key: &str,
        _window: Duration,
        _now: SystemTime,
    ) -> Result<u64> {
        std::future::pending().await
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "Hanging"
    }
}

/// Store stub whose reads work but whose writes fail
pub struct ReadOnlyStore(pub MemoryStore);

#[async_trait]
impl CacheStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.0.get(key).await
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Err(anyhow!("READONLY You can't write against a read only replica"))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.0.remove(key).await
    }

    async fn remove_pattern(&self, pattern: &str) -> Result<usize> {
        self.0.remove_pattern(pattern).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.0.exists(key).await
    }

    async fn sliding_window(&self, key: &str, window: Duration, now: SystemTime) -> Result<u64> {
        self.0.sliding_window(key, window, now).await
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "ReadOnly"
    }
}

/// Generate test data of various types
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Product {
        pub id: u64,
        pub name: String,
        pub price: f64,
        pub category: String,
    }

    impl Product {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("Product {}", id),
                price: 99.99 + (id as f64),
                category: format!("Category {}", id % 5),
            }
        }
    }

    /// Generate JSON test data
    pub fn json_product(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("Product {}", id),
            "price": 99.99 + (id as f64),
        })
    }
}
