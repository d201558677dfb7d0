//! Unified error types for Keyspan.
//!
//! Wraps the layered store errors in one flat enum with a stable shape.

use thiserror::Error;

/// All Keyspan errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Snapshot token unknown or already released
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not available in this configuration
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid input (bad range, key width, configuration)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage engine failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Database or pool shut down
    #[error("closed")]
    Closed,

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Keyspan operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the operation is unsupported here.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }

    /// Check if the database was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Storage(_))
    }
}

// Convert from store errors
impl From<keyspan_core::Error> for Error {
    fn from(e: keyspan_core::Error) -> Self {
        use keyspan_core::Error as StoreError;
        match e {
            StoreError::Io { .. } => Error::Storage(e.to_string()),
            StoreError::Unsupported(msg) => Error::Unsupported(msg),
            StoreError::SnapshotNotFound(id) => Error::NotFound(format!("snapshot {}", id)),
            StoreError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            StoreError::Closed => Error::Closed,
            StoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}

impl From<keyspan_engine::ConfigError> for Error {
    fn from(e: keyspan_engine::ConfigError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}
