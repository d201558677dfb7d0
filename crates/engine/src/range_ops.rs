//! Range operations
//!
//! Reads stream lazily from an engine cursor on the scan budget. A range
//! holding a single key never opens a cursor; it is answered with a point
//! lookup under that key's stripe.
//!
//! `set_range` is two phases with no isolation between them: the old
//! contents are deleted, then the new entries are written window by window.
//! A concurrent reader may observe the range empty or partially filled.

use crate::dictionary::{Dictionary, DictionaryInner};
use crate::snapshot::EnginePin;
use crate::stream::{emit, produce, windows, EntryStream, KeyStream, ResultStream};
use futures::future::try_join_all;
use futures::stream::{self, Stream, StreamExt};
use keyspan_core::{Error, Key, KeyDisplay, KeyRange, Result, SnapshotToken, Value};
use keyspan_storage::{CappedWriteBatch, ReadView};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

fn prefix_of(key: &[u8], len: usize) -> &[u8] {
    &key[..len.min(key.len())]
}

/// Disjoint first-byte shards covering the whole key space.
fn byte_shards(count: usize) -> Vec<KeyRange> {
    let count = count.clamp(1, 256);
    let bound = |i: usize| vec![(i * 256 / count) as u8];
    (0..count)
        .map(|i| {
            let min = (i > 0).then(|| bound(i));
            let max = (i + 1 < count).then(|| bound(i + 1));
            KeyRange::new(min, max).unwrap_or_else(|_| KeyRange::all())
        })
        .collect()
}

impl DictionaryInner {
    /// Visit the live entries of `range` in ascending order until `visit`
    /// returns `false`.
    pub(crate) fn scan_blocking<F>(&self, view: ReadView, range: &KeyRange, mut visit: F) -> Result<()>
    where
        F: FnMut(Key, Value) -> Result<bool>,
    {
        if let Some(key) = range.single_key() {
            let _guard = self.read_lock(view, key);
            if let Some(value) = self.get_unlocked(view, key, false)? {
                visit(key.to_vec(), value)?;
            }
            return Ok(());
        }

        let mut cursor = self
            .engine
            .scan(self.column, view, range)
            .map_err(|e| Error::io("iterate", range, e))?;
        while let Some((key, value)) = cursor
            .next_entry()
            .map_err(|e| Error::io("iterate", range, e))?
        {
            if !visit(key, value)? {
                break;
            }
        }
        Ok(())
    }

    fn first_entry(&self, view: ReadView, range: &KeyRange) -> Result<Option<(Key, Value)>> {
        let mut first = None;
        self.scan_blocking(view, range, |key, value| {
            first = Some((key, value));
            Ok(false)
        })?;
        Ok(first)
    }

    fn count_blocking(&self, view: ReadView, range: &KeyRange, cap: Option<u64>) -> Result<u64> {
        let mut count = 0u64;
        self.scan_blocking(view, range, |_, _| {
            count += 1;
            Ok(cap.map_or(true, |cap| count < cap))
        })?;
        Ok(count)
    }

    /// Delete every key of `range`.
    pub(crate) fn delete_range_blocking(&self, range: &KeyRange) -> Result<()> {
        if let Some(key) = range.single_key() {
            let _guard = self.write_lock(key);
            return self.delete_unlocked(key);
        }

        let mut batch = CappedWriteBatch::new(
            self.engine.as_ref(),
            self.column,
            self.config.write_batch_cap,
            self.config.max_write_batch_bytes,
        );
        if self.engine.supports_delete_range() && self.config.native_delete_range {
            batch
                .delete_range(range.clone())
                .map_err(|e| Error::io("delete", range, e))?;
        } else {
            // The cursor reads its own pinned sequence, so batches flushed
            // mid-scan do not disturb it.
            let mut pending = Ok(());
            self.scan_blocking(ReadView::Latest, range, |key, _| {
                pending = batch.delete(key);
                Ok(pending.is_ok())
            })?;
            pending.map_err(|e| Error::io("delete", range, e))?;
        }
        batch.finish().map_err(|e| Error::io("delete", range, e))?;
        Ok(())
    }

    /// Delete `range`, sending each removed entry to `tx` before the batch
    /// holding its delete is written.
    fn drain_range_blocking(
        &self,
        range: &KeyRange,
        tx: &tokio::sync::mpsc::Sender<Result<(Key, Value)>>,
    ) -> Result<()> {
        let mut batch = CappedWriteBatch::new(
            self.engine.as_ref(),
            self.column,
            self.config.write_batch_cap,
            self.config.max_write_batch_bytes,
        );
        let mut pending = Ok(());
        self.scan_blocking(ReadView::Latest, range, |key, value| {
            if !emit(tx, (key.clone(), value)) {
                return Ok(false);
            }
            pending = batch.delete(key);
            Ok(pending.is_ok())
        })?;
        pending.map_err(|e| Error::io("delete", range, e))?;
        batch.finish().map_err(|e| Error::io("delete", range, e))?;
        Ok(())
    }

    fn remove_one_blocking(&self, range: &KeyRange) -> Result<Option<(Key, Value)>> {
        loop {
            let Some((key, _)) = self.first_entry(ReadView::Latest, range)? else {
                return Ok(None);
            };
            let _guard = self.write_lock(&key);
            // Another writer may have removed it between the scan and the lock.
            if let Some(value) = self.get_unlocked(ReadView::Latest, &key, true)? {
                self.delete_unlocked(&key)?;
                return Ok(Some((key, value)));
            }
        }
    }

    fn clear_blocking(&self) -> Result<()> {
        self.delete_range_blocking(&KeyRange::all())?;
        self.engine
            .compact(self.column)
            .map_err(|e| Error::io("compact", &self.name, e))?;
        self.engine
            .flush()
            .map_err(|e| Error::io("flush", &self.name, e))?;
        debug!(dictionary = %self.name, "Cleared dictionary");
        Ok(())
    }
}

impl Dictionary {
    fn scan_stream<T, F>(&self, snapshot: Option<SnapshotToken>, range: KeyRange, producer: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: FnOnce(&DictionaryInner, ReadView, &KeyRange, &tokio::sync::mpsc::Sender<Result<T>>) -> Result<()>
            + Send
            + 'static,
    {
        let inner = Arc::clone(&self.inner);
        produce(self.inner.pool.clone(), self.inner.config.stream_buffer, move |tx| {
            let view = inner.read_view(snapshot)?;
            producer(inner.as_ref(), view, &range, tx)
        })
    }

    /// Stream the entries of `range` in ascending key order.
    ///
    /// The scan starts on first poll and stops when the stream is dropped.
    pub fn get_range(&self, snapshot: Option<SnapshotToken>, range: KeyRange) -> EntryStream {
        self.scan_stream(snapshot, range, |inner, view, range, tx| {
            inner.scan_blocking(view, range, |key, value| Ok(emit(tx, (key, value))))
        })
    }

    /// Stream the keys of `range` in ascending order.
    pub fn get_range_keys(&self, snapshot: Option<SnapshotToken>, range: KeyRange) -> KeyStream {
        self.scan_stream(snapshot, range, |inner, view, range, tx| {
            inner.scan_blocking(view, range, |key, _| Ok(emit(tx, key)))
        })
    }

    /// Stream the entries of `range` grouped by their first `prefix_len`
    /// bytes. Each group is emitted once complete.
    pub fn get_range_grouped(
        &self,
        snapshot: Option<SnapshotToken>,
        range: KeyRange,
        prefix_len: usize,
    ) -> ResultStream<Vec<(Key, Value)>> {
        self.scan_stream(snapshot, range, move |inner, view, range, tx| {
            let mut group: Vec<(Key, Value)> = Vec::new();
            let mut open = true;
            inner.scan_blocking(view, range, |key, value| {
                let same = group
                    .first()
                    .map_or(true, |(first, _)| prefix_of(first, prefix_len) == prefix_of(&key, prefix_len));
                if !same {
                    open = emit(tx, std::mem::take(&mut group));
                }
                group.push((key, value));
                Ok(open)
            })?;
            if open && !group.is_empty() {
                emit(tx, group);
            }
            Ok(())
        })
    }

    /// Keys-only form of [`get_range_grouped`](Self::get_range_grouped).
    pub fn get_range_keys_grouped(
        &self,
        snapshot: Option<SnapshotToken>,
        range: KeyRange,
        prefix_len: usize,
    ) -> ResultStream<Vec<Key>> {
        self.scan_stream(snapshot, range, move |inner, view, range, tx| {
            let mut group: Vec<Key> = Vec::new();
            let mut open = true;
            inner.scan_blocking(view, range, |key, _| {
                let same = group
                    .first()
                    .map_or(true, |first| prefix_of(first, prefix_len) == prefix_of(&key, prefix_len));
                if !same {
                    open = emit(tx, std::mem::take(&mut group));
                }
                group.push(key);
                Ok(open)
            })?;
            if open && !group.is_empty() {
                emit(tx, group);
            }
            Ok(())
        })
    }

    /// Stream the distinct `prefix_len`-byte prefixes of the keys in `range`.
    pub fn get_range_key_prefixes(
        &self,
        snapshot: Option<SnapshotToken>,
        range: KeyRange,
        prefix_len: usize,
    ) -> KeyStream {
        self.scan_stream(snapshot, range, move |inner, view, range, tx| {
            let mut last: Option<Key> = None;
            inner.scan_blocking(view, range, |key, _| {
                let prefix = prefix_of(&key, prefix_len);
                if last.as_deref() == Some(prefix) {
                    return Ok(true);
                }
                let prefix = prefix.to_vec();
                last = Some(prefix.clone());
                Ok(emit(tx, prefix))
            })
        })
    }

    /// Replace the contents of `range` with `entries`.
    ///
    /// Every entry must fall inside `range`; the first one outside fails the
    /// call with `InvalidArgument` after the earlier windows were written.
    /// Duplicate keys resolve last-write-wins.
    pub async fn set_range<S>(&self, range: KeyRange, entries: S) -> Result<()>
    where
        S: Stream<Item = (Key, Value)> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let target = range.clone();
        self.inner
            .pool
            .run(move || inner.delete_range_blocking(&target))
            .await?;
        self.write_range_entries(range, entries).await
    }

    async fn write_range_entries<S>(&self, range: KeyRange, entries: S) -> Result<()>
    where
        S: Stream<Item = (Key, Value)> + Send + 'static,
    {
        let config = &self.inner.config;
        let mut batches = windows(
            entries,
            config.multi_get_window,
            config.window_max_bytes,
            |(k, v): &(Key, Value)| k.len() + v.len(),
        );
        while let Some(window) = batches.next().await {
            if let Some((key, _)) = window.iter().find(|(key, _)| !range.contains(key)) {
                return Err(Error::InvalidArgument(format!(
                    "key {} is outside range {}",
                    KeyDisplay(key),
                    range
                )));
            }
            let inner = Arc::clone(&self.inner);
            self.inner
                .pool
                .run(move || inner.put_window(window, false))
                .await?;
        }
        Ok(())
    }

    /// Like [`set_range`](Self::set_range), streaming the entries it removed.
    ///
    /// The new entries are written after the last removed entry has been
    /// consumed; drop the stream early and only the entries emitted so far
    /// are removed and nothing is written.
    pub fn set_range_and_get_previous<S>(&self, range: KeyRange, entries: S) -> EntryStream
    where
        S: Stream<Item = (Key, Value)> + Send + 'static,
    {
        let failed = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.inner);
        let target = range.clone();
        let removed = produce(self.inner.pool.clone(), self.inner.config.stream_buffer, move |tx| {
            inner.drain_range_blocking(&target, tx)
        });

        let seen = Arc::clone(&failed);
        let removed = removed.inspect(move |item| {
            if item.is_err() {
                seen.store(true, Ordering::Release);
            }
        });

        let dict = self.clone();
        let written = stream::once(async move {
            if failed.load(Ordering::Acquire) {
                return Ok(());
            }
            dict.write_range_entries(range, entries).await
        })
        .filter_map(|result| async move { result.err().map(Err) });

        removed.chain(written).boxed()
    }

    /// Count the keys in `range`.
    ///
    /// For the whole dictionary, `fast` answers with the engine's estimate at
    /// the latest state, or with a scan capped at `fast_size_scan_cap` at a
    /// snapshot. Exact whole-dictionary counts run in parallel over disjoint
    /// first-byte shards of one consistent view.
    pub async fn size_range(&self, snapshot: Option<SnapshotToken>, range: KeyRange, fast: bool) -> Result<u64> {
        let view = self.inner.read_view(snapshot)?;
        if range.is_all() {
            if fast {
                return self.fast_size(view).await;
            }
            return self.exact_size(view).await;
        }
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.count_blocking(view, &range, None))
            .await
    }

    async fn fast_size(&self, view: ReadView) -> Result<u64> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || match view {
                ReadView::Latest => inner
                    .engine
                    .estimate_num_keys(inner.column)
                    .map_err(|e| Error::io("estimate", &inner.name, e)),
                ReadView::At(_) => {
                    let cap = inner.config.fast_size_scan_cap;
                    inner.count_blocking(view, &KeyRange::all(), Some(cap.max(1)))
                }
            })
            .await
    }

    async fn exact_size(&self, view: ReadView) -> Result<u64> {
        // Each shard task holds the pin, so it is released once the last
        // shard finishes or the caller drops this future, whichever is later.
        let (view, pin) = match view {
            ReadView::At(_) => (view, None),
            ReadView::Latest => {
                let engine = Arc::clone(&self.inner.engine);
                let pin = self.inner.pool.run(move || EnginePin::acquire(engine)).await?;
                (pin.view(), Some(Arc::new(pin)))
            }
        };

        let counts = try_join_all(byte_shards(self.inner.config.exact_size_shards).into_iter().map(|shard| {
            let inner = Arc::clone(&self.inner);
            let pool = self.inner.pool.clone();
            let pin = pin.clone();
            async move {
                pool.run(move || {
                    let _pin = pin;
                    inner.count_blocking(view, &shard, None)
                })
                .await
            }
        }))
        .await?;
        Ok(counts.into_iter().sum())
    }

    /// Whether `range` holds no keys.
    pub async fn is_range_empty(&self, snapshot: Option<SnapshotToken>, range: KeyRange) -> Result<bool> {
        Ok(self.get_one_key(snapshot, range).await?.is_none())
    }

    /// First entry of `range`.
    pub async fn get_one(&self, snapshot: Option<SnapshotToken>, range: KeyRange) -> Result<Option<(Key, Value)>> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || {
                let view = inner.read_view(snapshot)?;
                inner.first_entry(view, &range)
            })
            .await
    }

    /// First key of `range`.
    pub async fn get_one_key(&self, snapshot: Option<SnapshotToken>, range: KeyRange) -> Result<Option<Key>> {
        Ok(self.get_one(snapshot, range).await?.map(|(key, _)| key))
    }

    /// Remove and return the first entry of `range`.
    pub async fn remove_one(&self, range: KeyRange) -> Result<Option<(Key, Value)>> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.remove_one_blocking(&range))
            .await
    }

    /// Remove every key, then compact the column.
    pub async fn clear(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.run(move || inner.clear_blocking()).await
    }
}
