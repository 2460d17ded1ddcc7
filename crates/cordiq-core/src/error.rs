//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
///
/// Most public operations of the auto-save and recovery flows never return
/// these directly; they are logged and folded into status fields instead.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the local draft store or configuration files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// HTTP transport error talking to the draft service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The draft service answered with an error.
    #[error("Remote draft service error: {0}")]
    Remote(String),

    /// Local storage is unavailable (quota, poisoned lock, ...).
    #[error("Local storage unavailable: {0}")]
    Storage(String),

    /// Response cache could not be opened.
    #[error("Cache error: {0}")]
    Cache(#[from] cordiq_cache::CacheError),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
