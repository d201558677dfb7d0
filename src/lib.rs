//! # Keyspan
//!
//! Embedded, snapshot-isolated byte dictionaries.
//!
//! Keyspan stores ordered byte keys and byte values in named dictionaries
//! over a pluggable engine. Every operation is asynchronous; range reads are
//! lazy streams.
//!
//! ## Quick Start
//!
//! ```ignore
//! use keyspan::prelude::*;
//!
//! let db = Keyspan::open_in_memory()?;
//! let counters = db.dictionary("counters", UpdateMode::Allow)?;
//!
//! // Atomic read-modify-write
//! counters
//!     .update(b"hits".to_vec(), |old| {
//!         let n = old.map_or(0, |v| v[0]);
//!         Some(vec![n + 1])
//!     }, UpdateReturnMode::NewValue, false)
//!     .await?;
//!
//! // Range reads at a snapshot
//! let snapshot = db.take_snapshot().await?;
//! let mut entries = counters.get_range(Some(snapshot), KeyRange::all());
//! while let Some(entry) = entries.next().await {
//!     let (key, value) = entry?;
//! }
//! db.release_snapshot(snapshot).await?;
//! ```
//!
//! ## Structures
//!
//! - [`Dictionary`] - Point, multi-key and range operations on one column
//! - [`SubMap`] - A nested map under a fixed-width key prefix

#![warn(missing_docs)]

mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use database::{Keyspan, KeyspanBuilder};
pub use error::{Error, Result};

// Re-export store handles
pub use keyspan_concurrency::StoragePool;
pub use keyspan_engine::{
    ConfigError, Database, DatabaseConfig, Dictionary, EntryStream, KeyStream, ResultStream,
};
pub use keyspan_primitives::SubMap;
pub use keyspan_storage::{KvEngine, MemoryEngine, MemoryEngineOptions};

// Re-export types
pub use keyspan_core::{
    first_range_key, next_range_key, Delta, ErrorKind, Key, KeyLayout, KeyRange, ResultType,
    SnapshotToken, UpdateMode, UpdateReturnMode, Value,
};

/// Store-level error returned by [`Dictionary`] and [`SubMap`] operations.
pub use keyspan_core::Error as StoreError;
