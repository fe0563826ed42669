//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A live entry already exists for the key
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Key is absent or its entry has expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored value cannot take part in the requested numeric operation
    #[error("Type mismatch for {key}: stored value is not {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },

    /// Snapshot could not be written out
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// Snapshot data was malformed; the live store is left untouched
    #[error("Failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    /// Reading or writing a snapshot file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sweeper was requested outside of a Tokio runtime
    #[error("Background sweeper requires a running Tokio runtime")]
    NoRuntime,

    /// A sweeper was requested with a zero interval
    #[error("Sweeper interval must be non-zero")]
    ZeroInterval,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
