//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A live item already exists for the key
    #[error("Item {0} already exists")]
    AlreadyExists(String),

    /// Key absent from the cache, or present but expired
    #[error("Item {0} not found")]
    NotFound(String),

    /// Snapshot input could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Snapshot could not be encoded or written
    #[error("Encode error: {0}")]
    Encode(String),

    /// Background janitor could not be started
    #[error("Janitor error: {0}")]
    Janitor(String),
}

impl CacheError {
    /// Builds an `AlreadyExists` error naming the key.
    pub(crate) fn already_exists<K: std::fmt::Debug>(key: &K) -> Self {
        CacheError::AlreadyExists(format!("{:?}", key))
    }

    /// Builds a `NotFound` error naming the key.
    pub(crate) fn not_found<K: std::fmt::Debug>(key: &K) -> Self {
        CacheError::NotFound(format!("{:?}", key))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
