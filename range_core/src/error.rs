//! Error types for the range_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for range_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Referenced record absent or not visible to the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// Validation failure (caliber mismatch, insufficient stock, bad date, ...)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Concurrent store modification detected; caller should retry
    #[error("conflict: {0}")]
    Conflict(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// True for errors the boundary layer should map to a client fault
    /// rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::BadRequest(_) | Error::Conflict(_)
        )
    }
}
