//! Error types for Keyspan
//!
//! Two layers:
//! - [`EngineError`]: what the ordered byte-store engine reports
//! - [`Error`]: what dictionary operations surface to callers, with the
//!   failing operation and the key or range it touched

use std::io;
use thiserror::Error;

/// Errors reported by a storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was closed
    #[error("engine is closed")]
    Closed,

    /// The column does not exist in this engine
    #[error("unknown column {0}")]
    UnknownColumn(u32),

    /// A read view referenced a sequence that is no longer pinned
    #[error("snapshot at sequence {0} is not pinned")]
    SnapshotReleased(u64),

    /// Stored data failed a consistency check
    #[error("corruption: {0}")]
    Corruption(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by dictionary operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An engine call failed
    #[error("Failed to {operation} {context}: {source}")]
    Io {
        /// Operation name ("read", "write", "delete", "iterate", ...)
        operation: &'static str,
        /// Rendered key or range
        context: String,
        /// Engine failure
        #[source]
        source: EngineError,
    },

    /// Operation not permitted in this configuration
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Snapshot token unknown or already released
    #[error("Snapshot {0} not found!")]
    SnapshotNotFound(u64),

    /// Malformed argument (range bounds, mode codes, key lengths)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store or its worker pool has been shut down
    #[error("store is closed")]
    Closed,

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for dictionary operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Engine I/O failure
    Io,
    /// Unsupported operation
    Unsupported,
    /// Unknown or released snapshot
    NotFound,
    /// Malformed argument
    InvalidArgument,
    /// Closed store
    Closed,
    /// Internal error
    Internal,
}

impl Error {
    /// Wrap an engine failure with operation and context.
    pub fn io(operation: &'static str, context: impl ToString, source: EngineError) -> Self {
        match source {
            EngineError::Closed => Error::Closed,
            source => Error::Io {
                operation,
                context: context.to_string(),
                source,
            },
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::SnapshotNotFound(_) => ErrorKind::NotFound,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Closed => ErrorKind::Closed,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is an unsupported-operation error.
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }
}
