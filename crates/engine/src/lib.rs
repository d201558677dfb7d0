//! Dictionary store for Keyspan
//!
//! This crate turns an ordered byte-store engine into concurrent,
//! snapshot-isolated dictionaries:
//! - Database: engine + worker pool + snapshot registry, hands out dictionaries
//! - Dictionary: point, multi-key, and range operations over one column
//! - Update protocol: read lock, optimistic upgrade, restart under write lock
//! - DatabaseConfig: windows, caps, pool sizes, loadable from TOML

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod database;
pub mod dictionary;
pub mod snapshot;
pub mod stream;

mod multi;
mod range_ops;
mod update;

pub use config::{ConfigError, DatabaseConfig};
pub use database::{Database, DatabaseBuilder};
pub use dictionary::Dictionary;
pub use snapshot::SnapshotRegistry;
pub use stream::{EntryStream, KeyStream, ResultStream};
