//! Backing store implementations
//!
//! # Available Stores
//!
//! - **Redis** - shared distributed store with TTL, SCAN-based pattern
//!   deletion, and atomic pipelines (default, feature `redis`)
//! - **Memory** - `DashMap`-based in-process store implementing the same
//!   contract; used by the test suite and for local development

pub mod memory_store;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory_store::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
