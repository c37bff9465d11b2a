//! Error types for tilawa-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for tilawa-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Malformed or out-of-range verse reference
    #[error("Invalid verse: {0}")]
    InvalidKey(String),

    /// The engine loop has shut down and no longer accepts requests
    #[error("Playback engine stopped")]
    EngineStopped,

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tilawa_common::Error> for Error {
    fn from(err: tilawa_common::Error) -> Self {
        match err {
            tilawa_common::Error::Io(e) => Error::Io(e),
            tilawa_common::Error::Config(msg) => Error::Config(msg),
            tilawa_common::Error::NotFound(msg) => Error::NotFound(msg),
            tilawa_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            tilawa_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Convenience Result type using tilawa-ap Error
pub type Result<T> = std::result::Result<T, Error>;
