//! Error types for cache operations.

use thiserror::Error;

/// Errors raised by cache backends and the cache service internals.
///
/// The public [`ResponseCacheService`](crate::ResponseCacheService) API never
/// returns these; they are logged and converted into misses or no-ops.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend has not been connected, or was closed.
    #[error("Cache backend is not connected")]
    NotConnected,

    /// The backend is unavailable for another reason.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;
