//! Error types for gazette-dl
//!
//! Listing-level and document-level failures are almost always handled locally
//! (logged and skipped). The types here cover what does propagate: configuration
//! problems, network and HTTP failures surfaced by the fetch engine, storage I/O and
//! sink persistence errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gazette-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gazette-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_requests")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Network error raised by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// The requested URL
        url: String,
    },

    /// A URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a document to its storage path failed
    #[error("failed to store {path}: {reason}")]
    Storage {
        /// Absolute path of the file that could not be written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record reached a stage that needs a field the enrichment step did not fill
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),

    /// Harvest was cancelled - not starting new requests
    #[error("harvest cancelled: not starting new requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error on a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Constraint violation (e.g., duplicate checksum)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}
