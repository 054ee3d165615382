//! Error types for agrogest-core

use thiserror::Error;

/// Result type alias using agrogest-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in agrogest-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store could not be opened or migrated
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stock removal larger than the quantity on hand
    #[error("Insufficient stock for item {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: f64,
        available: f64,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote backend rejected a request
    #[error("Remote backend error: {0}")]
    Remote(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the error means the local store itself is unusable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}
