//! Error taxonomy for the cache layer
//!
//! None of these errors ever escape a wrapped operation: the `Cacheable` and
//! `CacheEvict` wrappers absorb them at the boundary and degrade to direct
//! invocation, and the rate limiter fails open. They exist so internal code
//! can distinguish the failure classes for logging and stats.

use thiserror::Error;

/// Failure classes inside the cache/rate-limit subsystem
#[derive(Debug, Error)]
pub enum CacheError {
    /// A key template references a placeholder no binding source supplies.
    ///
    /// Recoverable: the wrapper falls through to uncached execution.
    #[error("unresolved placeholder '{placeholder}' in key template '{template}'")]
    KeyResolution {
        template: String,
        placeholder: String,
    },

    /// Backing store read/write/delete/pipeline failure (connection,
    /// timeout, protocol). Fail-through in the cache layer, fail-open in
    /// the rate limiter.
    #[error("backing store operation failed: {0}")]
    Store(#[source] anyhow::Error),

    /// Value could not be encoded or decoded. A decode failure is treated
    /// as a cache miss; an encode failure skips the write.
    #[error("cache value serialization failed: {0}")]
    Serialization(#[source] anyhow::Error),
}

impl CacheError {
    /// Short tag for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeyResolution { .. } => "key_resolution",
            Self::Store(_) => "store",
            Self::Serialization(_) => "serialization",
        }
    }
}
