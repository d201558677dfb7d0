//! Storage layer for Keyspan
//!
//! This crate defines the ordered byte-store contract the dictionary store
//! runs on, and ships one implementation:
//! - KvEngine / EngineCursor: point ops, atomic write batches, range cursors,
//!   sequence-pinned snapshots, key estimates, compaction
//! - WriteBatch / CappedWriteBatch: batched mutations with auto-flush caps
//! - BloomFilter: per-column existence probe
//! - MemoryEngine: BTreeMap-backed MVCC engine with version chains

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod bloom;
pub mod engine;
pub mod memory;

pub use batch::{BatchOp, CappedWriteBatch, WriteBatch};
pub use bloom::BloomFilter;
pub use engine::{ColumnId, EngineCursor, KvEngine, ReadView};
pub use memory::{MemoryEngine, MemoryEngineOptions};
