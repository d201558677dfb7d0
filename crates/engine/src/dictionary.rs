//! Dictionary store
//!
//! A [`Dictionary`] is one column of the engine viewed as a byte-key to
//! byte-value map. Every operation is asynchronous: the blocking engine work
//! runs on the database's [`StoragePool`] and the caller awaits a future or
//! consumes a stream.
//!
//! # Locking
//!
//! With [`UpdateMode::Allow`] each key maps to one of a fixed set of stamped
//! lock stripes. Reads take the stripe shared, writes take it exclusive, and
//! `update` uses the optimistic upgrade protocol. With
//! [`UpdateMode::Disallow`] no stripes exist at all and `update` is refused.
//!
//! # Example
//!
//! ```ignore
//! let dict = db.dictionary("users", UpdateMode::Allow)?;
//! dict.put(b"alice".to_vec(), b"1".to_vec(), ResultType::Void).await?;
//! let value = dict.get(None, b"alice".to_vec(), false).await?;
//! ```

use crate::config::DatabaseConfig;
use crate::snapshot::SnapshotRegistry;
use keyspan_concurrency::{StampGuard, StoragePool, StripedLocks};
use keyspan_core::{
    Error, Key, KeyDisplay, Result, ResultType, SnapshotToken, UpdateMode, Value,
};
use keyspan_storage::{ColumnId, KvEngine, ReadView};
use std::sync::Arc;
use tracing::trace;

pub(crate) struct DictionaryInner {
    pub(crate) name: String,
    pub(crate) database_name: String,
    pub(crate) engine: Arc<dyn KvEngine>,
    pub(crate) column: ColumnId,
    pub(crate) update_mode: UpdateMode,
    pub(crate) stripes: Option<StripedLocks>,
    pub(crate) snapshots: Arc<SnapshotRegistry>,
    pub(crate) pool: StoragePool,
    pub(crate) config: Arc<DatabaseConfig>,
}

impl DictionaryInner {
    pub(crate) fn read_view(&self, snapshot: Option<SnapshotToken>) -> Result<ReadView> {
        self.snapshots.resolve(snapshot)
    }

    /// Shared stripe for reads of the latest state. Snapshot reads are immutable
    /// and skip locking.
    pub(crate) fn read_lock(&self, view: ReadView, key: &[u8]) -> Option<StampGuard<'_>> {
        match view {
            ReadView::Latest => self.stripes.as_ref().map(|s| s.read(key)),
            ReadView::At(_) => None,
        }
    }

    pub(crate) fn write_lock(&self, key: &[u8]) -> Option<StampGuard<'_>> {
        self.stripes.as_ref().map(|s| s.write(key))
    }

    /// Point read. Without `exists_almost_certainly` the column's bloom
    /// filter is probed first and a negative answer skips the lookup.
    pub(crate) fn get_unlocked(
        &self,
        view: ReadView,
        key: &[u8],
        exists_almost_certainly: bool,
    ) -> Result<Option<Value>> {
        if !exists_almost_certainly {
            let may_exist = self
                .engine
                .may_contain(self.column, key)
                .map_err(|e| Error::io("read", KeyDisplay(key), e))?;
            if !may_exist {
                return Ok(None);
            }
        }
        let value = self
            .engine
            .get(self.column, view, key)
            .map_err(|e| Error::io("read", KeyDisplay(key), e))?;
        trace!(dictionary = %self.name, key = %KeyDisplay(key), found = value.is_some(), "Read");
        Ok(value)
    }

    pub(crate) fn write_unlocked(&self, key: &[u8], value: &[u8]) -> Result<()> {
        trace!(dictionary = %self.name, key = %KeyDisplay(key), bytes = value.len(), "Writing");
        self.engine
            .put(self.column, key, value)
            .map_err(|e| Error::io("write", KeyDisplay(key), e))
    }

    pub(crate) fn delete_unlocked(&self, key: &[u8]) -> Result<()> {
        trace!(dictionary = %self.name, key = %KeyDisplay(key), "Deleting");
        self.engine
            .delete(self.column, key)
            .map_err(|e| Error::io("delete", KeyDisplay(key), e))
    }

    fn get_blocking(
        &self,
        snapshot: Option<SnapshotToken>,
        key: &[u8],
        exists_almost_certainly: bool,
    ) -> Result<Option<Value>> {
        let view = self.read_view(snapshot)?;
        let _guard = self.read_lock(view, key);
        self.get_unlocked(view, key, exists_almost_certainly)
    }

    fn put_blocking(&self, key: &[u8], value: &[u8], result_type: ResultType) -> Result<Option<Value>> {
        let _guard = self.write_lock(key);
        let previous = if result_type.needs_previous() {
            self.get_unlocked(ReadView::Latest, key, false)?
        } else {
            None
        };
        self.write_unlocked(key, value)?;
        Ok(result_type.project(previous))
    }

    fn remove_blocking(&self, key: &[u8], result_type: ResultType) -> Result<Option<Value>> {
        let _guard = self.write_lock(key);
        let previous = if result_type.needs_previous() {
            self.get_unlocked(ReadView::Latest, key, false)?
        } else {
            None
        };
        self.delete_unlocked(key)?;
        Ok(result_type.project(previous))
    }
}

/// Handle to one dictionary. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Dictionary {
    pub(crate) inner: Arc<DictionaryInner>,
}

impl Dictionary {
    pub(crate) fn from_inner(inner: DictionaryInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Dictionary (column) name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the owning database
    pub fn database_name(&self) -> &str {
        &self.inner.database_name
    }

    /// Update mode fixed at creation
    pub fn update_mode(&self) -> UpdateMode {
        self.inner.update_mode
    }

    /// Read one key.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Read at this snapshot instead of the latest state
    /// * `key` - Key to read
    /// * `exists_almost_certainly` - Skip the bloom filter probe; use when the
    ///   key is overwhelmingly likely to exist
    pub async fn get(
        &self,
        snapshot: Option<SnapshotToken>,
        key: impl Into<Key>,
        exists_almost_certainly: bool,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.get_blocking(snapshot, &key, exists_almost_certainly))
            .await
    }

    /// Whether a key exists.
    pub async fn contains_key(&self, snapshot: Option<SnapshotToken>, key: impl Into<Key>) -> Result<bool> {
        Ok(self.get(snapshot, key, false).await?.is_some())
    }

    /// Unconditional upsert.
    ///
    /// Returns the previous value, its existence (`[1]`/`[0]`), or nothing,
    /// according to `result_type`. The previous value is read under the same
    /// exclusive stripe hold as the write.
    pub async fn put(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
        result_type: ResultType,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.put_blocking(&key, &value, result_type))
            .await
    }

    /// Unconditional delete. Returns according to `result_type`.
    pub async fn remove(&self, key: impl Into<Key>, result_type: ResultType) -> Result<Option<Value>> {
        let key = key.into();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.remove_blocking(&key, result_type))
            .await
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("name", &self.inner.name)
            .field("database", &self.inner.database_name)
            .field("column", &self.inner.column)
            .field("update_mode", &self.inner.update_mode)
            .finish()
    }
}
