//! Write batches
//!
//! [`WriteBatch`] collects mutations that an engine applies atomically.
//! [`CappedWriteBatch`] bounds a long stream of mutations by flushing
//! whenever the pending batch reaches an operation or byte cap, so a
//! range delete over millions of keys never materializes one huge batch.

use crate::engine::{ColumnId, KvEngine};
use keyspan_core::{EngineResult, Key, KeyRange, Value};

/// One mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write `value` under `key`
    Put {
        /// Key
        key: Key,
        /// Value
        value: Value,
    },
    /// Delete `key`
    Delete {
        /// Key
        key: Key,
    },
    /// Delete every key in `range`
    DeleteRange {
        /// Range to clear
        range: KeyRange,
    },
}

impl BatchOp {
    fn byte_size(&self) -> usize {
        match self {
            BatchOp::Put { key, value } => key.len() + value.len(),
            BatchOp::Delete { key } => key.len(),
            BatchOp::DeleteRange { range } => {
                range.min().map_or(0, <[u8]>::len) + range.max().map_or(0, <[u8]>::len)
            }
        }
    }
}

/// Ordered list of mutations applied atomically by [`KvEngine::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    byte_size: usize,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `ops` operations
    pub fn with_capacity(ops: usize) -> Self {
        Self {
            ops: Vec::with_capacity(ops),
            byte_size: 0,
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: Key, value: Value) {
        self.push(BatchOp::Put { key, value });
    }

    /// Queue a delete
    pub fn delete(&mut self, key: Key) {
        self.push(BatchOp::Delete { key });
    }

    /// Queue a range delete
    pub fn delete_range(&mut self, range: KeyRange) {
        self.push(BatchOp::DeleteRange { range });
    }

    fn push(&mut self, op: BatchOp) {
        self.byte_size += op.byte_size();
        self.ops.push(op);
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total key and value bytes queued
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Queued operations in insertion order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume into operations
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Batch that writes itself out whenever it reaches a cap.
///
/// Atomicity holds per flushed chunk only.
pub struct CappedWriteBatch<'a> {
    engine: &'a dyn KvEngine,
    column: ColumnId,
    batch: WriteBatch,
    max_ops: usize,
    max_bytes: usize,
    flushed_ops: usize,
}

impl<'a> CappedWriteBatch<'a> {
    /// Create a capped batch over one column.
    pub fn new(engine: &'a dyn KvEngine, column: ColumnId, max_ops: usize, max_bytes: usize) -> Self {
        let max_ops = max_ops.max(1);
        Self {
            engine,
            column,
            batch: WriteBatch::with_capacity(max_ops.min(1024)),
            max_ops,
            max_bytes: max_bytes.max(1),
            flushed_ops: 0,
        }
    }

    /// Queue a put, flushing if a cap is reached.
    pub fn put(&mut self, key: Key, value: Value) -> EngineResult<()> {
        self.batch.put(key, value);
        self.flush_if_needed()
    }

    /// Queue a delete, flushing if a cap is reached.
    pub fn delete(&mut self, key: Key) -> EngineResult<()> {
        self.batch.delete(key);
        self.flush_if_needed()
    }

    /// Queue a range delete, flushing if a cap is reached.
    pub fn delete_range(&mut self, range: KeyRange) -> EngineResult<()> {
        self.batch.delete_range(range);
        self.flush_if_needed()
    }

    fn flush_if_needed(&mut self) -> EngineResult<()> {
        if self.batch.len() >= self.max_ops || self.batch.byte_size() >= self.max_bytes {
            self.flush()?;
        }
        Ok(())
    }

    /// Write out everything queued so far.
    pub fn flush(&mut self) -> EngineResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        self.flushed_ops += batch.len();
        self.engine.write(self.column, batch)
    }

    /// Flush the remainder and return the total number of operations written.
    pub fn finish(mut self) -> EngineResult<usize> {
        self.flush()?;
        Ok(self.flushed_ops)
    }
}
