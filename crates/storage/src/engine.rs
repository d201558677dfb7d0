//! Engine contract
//!
//! Everything the dictionary store needs from an ordered byte store:
//! unsigned lexicographic key order, point get/put/delete, atomic batches,
//! range cursors with inclusive-lower/exclusive-upper bounds, and immutable
//! read views pinned by a monotonically increasing sequence number.

use crate::batch::WriteBatch;
use keyspan_core::{EngineResult, Key, KeyRange, Value};

/// Identifier of one column (one dictionary) inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

/// Which state of the store a read observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadView {
    /// The newest committed state
    #[default]
    Latest,
    /// The state as of a pinned sequence number
    At(u64),
}

/// Forward cursor over a key range.
///
/// Dropping the cursor releases every engine resource it holds.
pub trait EngineCursor: Send {
    /// Next live entry in ascending key order, or `None` when exhausted.
    fn next_entry(&mut self) -> EngineResult<Option<(Key, Value)>>;
}

/// Ordered byte-store engine.
///
/// Implementations must be safe to share across threads; the dictionary
/// store calls them from blocking worker tasks.
pub trait KvEngine: Send + Sync + 'static {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Open a column, creating it if missing. Idempotent per name.
    fn create_column(&self, name: &str) -> EngineResult<ColumnId>;

    /// Point read.
    fn get(&self, column: ColumnId, view: ReadView, key: &[u8]) -> EngineResult<Option<Value>>;

    /// Probabilistic existence check. `false` means the key is certainly absent.
    fn may_contain(&self, column: ColumnId, key: &[u8]) -> EngineResult<bool>;

    /// Point write.
    fn put(&self, column: ColumnId, key: &[u8], value: &[u8]) -> EngineResult<()>;

    /// Point delete.
    fn delete(&self, column: ColumnId, key: &[u8]) -> EngineResult<()>;

    /// Apply a batch atomically.
    fn write(&self, column: ColumnId, batch: WriteBatch) -> EngineResult<()>;

    /// Whether [`BatchOp::DeleteRange`](crate::BatchOp::DeleteRange) is native.
    fn supports_delete_range(&self) -> bool;

    /// Open a cursor over `range` at `view`.
    fn scan(
        &self,
        column: ColumnId,
        view: ReadView,
        range: &KeyRange,
    ) -> EngineResult<Box<dyn EngineCursor>>;

    /// Approximate number of live keys in a column.
    fn estimate_num_keys(&self, column: ColumnId) -> EngineResult<u64>;

    /// Pin the current state and return its sequence number.
    fn snapshot(&self) -> EngineResult<u64>;

    /// Unpin a sequence returned by [`snapshot`](Self::snapshot).
    fn release_snapshot(&self, sequence: u64);

    /// Drop obsolete versions and rebuild per-column filters.
    fn compact(&self, column: ColumnId) -> EngineResult<()>;

    /// Persist buffered state.
    fn flush(&self) -> EngineResult<()>;

    /// Close the engine. Later calls fail with `EngineError::Closed`.
    fn close(&self);
}
