//! Error types for fieldsync-core

use thiserror::Error;

/// Result type alias using fieldsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (transient, safe to retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server rejected the request (permanent, not retried automatically)
    #[error("Server rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Offline - the requested operation needs network connectivity
    #[error("No network connection available")]
    Offline,
}

impl Error {
    /// Whether this error represents a permanent server-side rejection.
    ///
    /// Permanent rejections are not retried: replaying a request the server
    /// has already refused risks duplicate side effects. Timeouts (408) and
    /// throttling (429) still count as transient.
    pub const fn is_permanent_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
