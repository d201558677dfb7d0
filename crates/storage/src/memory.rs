//! In-memory MVCC engine
//!
//! Each column is a `BTreeMap` from key to a newest-first version chain.
//! Every committed batch gets the next sequence number; reads at a pinned
//! sequence see the newest version at or below it.
//!
//! # Design
//!
//! - Writers serialize on one mutex and publish their sequence after the
//!   batch is fully applied, so any published sequence is complete.
//! - Snapshot pins are reference-counted per sequence. Version chains keep
//!   every version a live pin can still observe and drop the rest.
//! - Cursors pin their own sequence, read in fixed-size chunks without
//!   holding the column lock between chunks, and unpin on drop.
//! - A per-column bloom filter answers `may_contain`; it is rebuilt when it
//!   saturates and on every compaction.

use crate::batch::{BatchOp, WriteBatch};
use crate::bloom::BloomFilter;
use crate::engine::{ColumnId, EngineCursor, KvEngine, ReadView};
use keyspan_core::{EngineError, EngineResult, Key, KeyRange, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

const BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Tuning for [`MemoryEngine`].
#[derive(Debug, Clone)]
pub struct MemoryEngineOptions {
    /// Initial bloom filter capacity per column
    pub bloom_capacity: usize,
    /// Entries read per cursor refill
    pub cursor_chunk: usize,
    /// Whether `DeleteRange` batch ops are advertised as native
    pub native_delete_range: bool,
}

impl Default for MemoryEngineOptions {
    fn default() -> Self {
        Self {
            bloom_capacity: 4096,
            cursor_chunk: 128,
            native_delete_range: true,
        }
    }
}

impl MemoryEngineOptions {
    /// Options that force callers onto the iterate-and-delete path.
    pub fn without_delete_range() -> Self {
        Self {
            native_delete_range: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct Version {
    seq: u64,
    // None marks a tombstone
    value: Option<Value>,
}

type VersionChain = SmallVec<[Version; 2]>;

fn visible(chain: &VersionChain, view: ReadView) -> Option<&Version> {
    match view {
        ReadView::Latest => chain.first(),
        ReadView::At(seq) => chain.iter().find(|v| v.seq <= seq),
    }
}

/// Drop versions no reader at or above `threshold` can observe.
/// Returns true if the whole chain can go.
fn prune(chain: &mut VersionChain, threshold: u64) -> bool {
    if let Some(pos) = chain.iter().position(|v| v.seq <= threshold) {
        chain.truncate(pos + 1);
    }
    chain.len() == 1 && chain[0].value.is_none() && chain[0].seq <= threshold
}

struct ColumnData {
    name: String,
    entries: BTreeMap<Key, VersionChain>,
    bloom: BloomFilter,
    live_keys: u64,
}

impl ColumnData {
    fn new(name: &str, bloom_capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            entries: BTreeMap::new(),
            bloom: BloomFilter::new(bloom_capacity, BLOOM_FALSE_POSITIVE_RATE),
            live_keys: 0,
        }
    }

    fn push_version(&mut self, key: &[u8], version: Version, threshold: u64) {
        let inserting = version.value.is_some();
        if inserting {
            self.bloom.insert(key);
        }
        if !inserting && !self.entries.contains_key(key) {
            return;
        }
        let chain = self.entries.entry(key.to_vec()).or_default();
        let was_live = chain.first().map_or(false, |v| v.value.is_some());
        if !was_live && !inserting {
            return;
        }
        chain.insert(0, version);
        match (was_live, inserting) {
            (false, true) => self.live_keys += 1,
            (true, false) => self.live_keys -= 1,
            _ => {}
        }
        if prune(chain, threshold) {
            self.entries.remove(key);
        }
    }

    fn live_keys_in(&self, range: &KeyRange) -> Vec<Key> {
        self.entries
            .range::<[u8], _>(bounds(range))
            .filter(|(_, chain)| chain.first().map_or(false, |v| v.value.is_some()))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn rebuild_bloom(&mut self, min_capacity: usize) {
        let capacity = (self.live_keys as usize).saturating_mul(2).max(min_capacity);
        let mut bloom = BloomFilter::new(capacity, BLOOM_FALSE_POSITIVE_RATE);
        for (key, chain) in &self.entries {
            if chain.iter().any(|v| v.value.is_some()) {
                bloom.insert(key);
            }
        }
        self.bloom = bloom;
    }
}

fn bounds(range: &KeyRange) -> (Bound<&[u8]>, Bound<&[u8]>) {
    let lower = range.min().map_or(Bound::Unbounded, Bound::Included);
    let upper = match (range.single_key(), range.max()) {
        (Some(key), _) => Bound::Included(key),
        (None, Some(hi)) => Bound::Excluded(hi),
        (None, None) => Bound::Unbounded,
    };
    (lower, upper)
}

struct Inner {
    options: MemoryEngineOptions,
    columns: RwLock<Vec<Arc<RwLock<ColumnData>>>>,
    column_names: RwLock<FxHashMap<String, ColumnId>>,
    sequence: AtomicU64,
    write_lock: Mutex<()>,
    pins: Mutex<BTreeMap<u64, usize>>,
    closed: AtomicBool,
}

impl Inner {
    fn check_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn column(&self, column: ColumnId) -> EngineResult<Arc<RwLock<ColumnData>>> {
        self.check_open()?;
        self.columns
            .read()
            .get(column.0 as usize)
            .cloned()
            .ok_or(EngineError::UnknownColumn(column.0))
    }

    fn pin_latest(&self) -> u64 {
        let mut pins = self.pins.lock();
        let seq = self.sequence.load(Ordering::Acquire);
        *pins.entry(seq).or_insert(0) += 1;
        seq
    }

    fn pin_existing(&self, seq: u64) -> EngineResult<()> {
        match self.pins.lock().get_mut(&seq) {
            Some(count) => {
                *count += 1;
                Ok(())
            }
            None => Err(EngineError::SnapshotReleased(seq)),
        }
    }

    fn check_pinned(&self, seq: u64) -> EngineResult<()> {
        if self.pins.lock().contains_key(&seq) {
            Ok(())
        } else {
            Err(EngineError::SnapshotReleased(seq))
        }
    }

    fn unpin(&self, seq: u64) -> bool {
        let mut pins = self.pins.lock();
        let Some(count) = pins.get_mut(&seq) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            pins.remove(&seq);
        }
        true
    }

    /// Oldest sequence any reader may still observe.
    fn prune_threshold(&self, published: u64) -> u64 {
        self.pins
            .lock()
            .keys()
            .next()
            .copied()
            .map_or(published, |oldest| oldest.min(published))
    }

    fn apply(&self, column: ColumnId, ops: Vec<BatchOp>) -> EngineResult<()> {
        let data = self.column(column)?;
        let _writer = self.write_lock.lock();
        let published = self.sequence.load(Ordering::Acquire);
        let seq = published + 1;
        let threshold = self.prune_threshold(published);
        {
            let mut col = data.write();
            for op in ops {
                match op {
                    BatchOp::Put { key, value } => {
                        col.push_version(&key, Version { seq, value: Some(value) }, threshold);
                    }
                    BatchOp::Delete { key } => {
                        col.push_version(&key, Version { seq, value: None }, threshold);
                    }
                    BatchOp::DeleteRange { range } => {
                        for key in col.live_keys_in(&range) {
                            col.push_version(&key, Version { seq, value: None }, threshold);
                        }
                    }
                }
            }
            if col.bloom.is_saturated() {
                trace!(column = %col.name, inserted = col.bloom.inserted(), "Rebuilding saturated bloom filter");
                let min_capacity = self.options.bloom_capacity;
                col.rebuild_bloom(min_capacity);
            }
        }
        self.sequence.store(seq, Ordering::Release);
        Ok(())
    }
}

/// BTreeMap-backed MVCC engine.
///
/// Cheap to clone; clones share state.
///
/// # Example
///
/// ```ignore
/// use keyspan_storage::{KvEngine, MemoryEngine, ReadView};
///
/// let engine = MemoryEngine::new();
/// let col = engine.create_column("users")?;
/// engine.put(col, b"k", b"v")?;
/// assert_eq!(engine.get(col, ReadView::Latest, b"k")?, Some(b"v".to_vec()));
/// ```
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<Inner>,
}

impl MemoryEngine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::with_options(MemoryEngineOptions::default())
    }

    /// Create an engine with explicit options
    pub fn with_options(options: MemoryEngineOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                columns: RwLock::new(Vec::new()),
                column_names: RwLock::new(FxHashMap::default()),
                sequence: AtomicU64::new(0),
                write_lock: Mutex::new(()),
                pins: Mutex::new(BTreeMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Last published sequence number
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::Acquire)
    }

    /// Number of distinct pinned sequences (snapshots and open cursors)
    pub fn pinned_count(&self) -> usize {
        self.inner.pins.lock().len()
    }

    /// Total versions stored in a column, tombstones included
    pub fn version_count(&self, column: ColumnId) -> EngineResult<usize> {
        let data = self.inner.column(column)?;
        let col = data.read();
        Ok(col.entries.values().map(|chain| chain.len()).sum())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KvEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    fn create_column(&self, name: &str) -> EngineResult<ColumnId> {
        self.inner.check_open()?;
        let mut names = self.inner.column_names.write();
        if let Some(id) = names.get(name) {
            return Ok(*id);
        }
        let mut columns = self.inner.columns.write();
        let id = ColumnId(columns.len() as u32);
        columns.push(Arc::new(RwLock::new(ColumnData::new(
            name,
            self.inner.options.bloom_capacity,
        ))));
        names.insert(name.to_string(), id);
        debug!(column = name, id = id.0, "Created column");
        Ok(id)
    }

    fn get(&self, column: ColumnId, view: ReadView, key: &[u8]) -> EngineResult<Option<Value>> {
        let data = self.inner.column(column)?;
        let col = data.read();
        // Pruning needs the column write lock, so a pin seen here stays
        // readable until `col` is dropped.
        if let ReadView::At(seq) = view {
            self.inner.check_pinned(seq)?;
        }
        Ok(col
            .entries
            .get(key)
            .and_then(|chain| visible(chain, view))
            .and_then(|v| v.value.clone()))
    }

    fn may_contain(&self, column: ColumnId, key: &[u8]) -> EngineResult<bool> {
        let data = self.inner.column(column)?;
        let col = data.read();
        Ok(col.bloom.may_contain(key))
    }

    fn put(&self, column: ColumnId, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.inner.apply(
            column,
            vec![BatchOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
        )
    }

    fn delete(&self, column: ColumnId, key: &[u8]) -> EngineResult<()> {
        self.inner.apply(column, vec![BatchOp::Delete { key: key.to_vec() }])
    }

    fn write(&self, column: ColumnId, batch: WriteBatch) -> EngineResult<()> {
        if batch.is_empty() {
            return self.inner.check_open();
        }
        self.inner.apply(column, batch.into_ops())
    }

    fn supports_delete_range(&self) -> bool {
        self.inner.options.native_delete_range
    }

    fn scan(
        &self,
        column: ColumnId,
        view: ReadView,
        range: &KeyRange,
    ) -> EngineResult<Box<dyn EngineCursor>> {
        let data = self.inner.column(column)?;
        let seq = match view {
            ReadView::Latest => self.inner.pin_latest(),
            ReadView::At(seq) => {
                self.inner.pin_existing(seq)?;
                seq
            }
        };
        let (lower, upper) = bounds(range);
        Ok(Box::new(MemoryCursor {
            inner: Arc::clone(&self.inner),
            column: data,
            seq,
            next_from: to_owned_bound(lower),
            upper: to_owned_bound(upper),
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn estimate_num_keys(&self, column: ColumnId) -> EngineResult<u64> {
        let data = self.inner.column(column)?;
        let col = data.read();
        Ok(col.live_keys)
    }

    fn snapshot(&self) -> EngineResult<u64> {
        self.inner.check_open()?;
        Ok(self.inner.pin_latest())
    }

    fn release_snapshot(&self, sequence: u64) {
        if !self.inner.unpin(sequence) {
            debug!(sequence, "Release of unpinned sequence ignored");
        }
    }

    fn compact(&self, column: ColumnId) -> EngineResult<()> {
        let data = self.inner.column(column)?;
        let _writer = self.inner.write_lock.lock();
        let published = self.inner.sequence.load(Ordering::Acquire);
        let threshold = self.inner.prune_threshold(published);
        let mut col = data.write();
        let before = col.entries.len();
        col.entries.retain(|_, chain| !prune(chain, threshold));
        let min_capacity = self.inner.options.bloom_capacity;
        col.rebuild_bloom(min_capacity);
        debug!(
            column = %col.name,
            removed = before - col.entries.len(),
            live = col.live_keys,
            "Compacted column"
        );
        Ok(())
    }

    fn flush(&self) -> EngineResult<()> {
        self.inner.check_open()
    }

    fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed memory engine");
        }
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("columns", &self.inner.columns.read().len())
            .field("sequence", &self.sequence())
            .field("pinned", &self.pinned_count())
            .finish()
    }
}

// ============================================================================
// Cursor
// ============================================================================

struct MemoryCursor {
    inner: Arc<Inner>,
    column: Arc<RwLock<ColumnData>>,
    seq: u64,
    next_from: Bound<Key>,
    upper: Bound<Key>,
    buffer: VecDeque<(Key, Value)>,
    exhausted: bool,
}

impl MemoryCursor {
    fn refill(&mut self) -> EngineResult<()> {
        self.inner.check_open()?;
        let chunk = self.inner.options.cursor_chunk.max(1);
        let col = self.column.read();
        let range = (
            as_slice_bound(&self.next_from),
            as_slice_bound(&self.upper),
        );
        let mut scanned = 0;
        let mut last = None;
        for (key, chain) in col.entries.range::<[u8], _>(range) {
            scanned += 1;
            if let Some(value) = visible(chain, ReadView::At(self.seq)).and_then(|v| v.value.as_ref()) {
                self.buffer.push_back((key.clone(), value.clone()));
            }
            last = Some(key);
            if scanned == chunk {
                break;
            }
        }
        match last {
            Some(key) if scanned == chunk => self.next_from = Bound::Excluded(key.clone()),
            _ => self.exhausted = true,
        }
        Ok(())
    }
}

fn to_owned_bound(bound: Bound<&[u8]>) -> Bound<Key> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn as_slice_bound(bound: &Bound<Key>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl EngineCursor for MemoryCursor {
    fn next_entry(&mut self) -> EngineResult<Option<(Key, Value)>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.refill()?;
        }
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.inner.unpin(self.seq);
    }
}
