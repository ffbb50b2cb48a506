//! Error types for the destination matcher
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for matcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the destination matcher
#[derive(Error, Debug)]
pub enum Error {
    /// A backing store could not serve the request (connectivity, I/O, ...)
    #[error("Store error ({store}): {message}")]
    Store {
        /// Store name (e.g. "destinations", "matchings")
        store: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Notification body or identifier could not be parsed
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Notification carried an operation kind this matcher does not handle
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Some neighbor updates of a unit failed while others were applied
    #[error(
        "Partial application for {destination_id}: {failed} of {attempted} neighbor updates failed"
    )]
    PartialApplication {
        /// Destination whose unit was partially applied
        destination_id: String,
        /// Number of failed neighbor updates
        failed: usize,
        /// Number of attempted neighbor updates
        attempted: usize,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed input error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create a partial application error
    pub fn partial_application(
        destination_id: impl Into<String>,
        failed: usize,
        attempted: usize,
    ) -> Self {
        Self::PartialApplication {
            destination_id: destination_id.into(),
            failed,
            attempted,
        }
    }

    /// Whether redelivering the same notification can succeed
    ///
    /// Every handler is idempotent, so store and partial failures are always
    /// safe to retry. Unknown operations never become known on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store { .. }
            | Error::Io(_)
            | Error::PartialApplication { .. }
            | Error::MalformedInput(_)
            | Error::Other(_) => true,
            Error::Config(_) | Error::Json(_) | Error::UnknownOperation(_) => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
