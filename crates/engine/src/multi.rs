//! Multi-key operations
//!
//! Input streams are cut into windows bounded by entry count and byte size.
//! Each window is one unit of pool work that holds the stripes of all its
//! keys at once. Windows run one after another, so output order follows
//! input order and a later duplicate of a key wins.

use crate::dictionary::{Dictionary, DictionaryInner};
use crate::stream::{flatten_batches, windows, ResultStream};
use futures::stream::{Stream, StreamExt};
use keyspan_core::{Error, Key, KeyDisplay, Result, SnapshotToken, Value};
use keyspan_storage::{CappedWriteBatch, ReadView};
use std::sync::Arc;
use tracing::trace;

fn entry_size(entry: &(Key, Value)) -> usize {
    entry.0.len() + entry.1.len()
}

impl DictionaryInner {
    fn get_window(
        &self,
        snapshot: Option<SnapshotToken>,
        keys: Vec<Key>,
        exists_almost_certainly: bool,
    ) -> Result<Vec<(Key, Option<Value>)>> {
        let view = self.read_view(snapshot)?;
        let _guard = match (view, &self.stripes) {
            (ReadView::Latest, Some(stripes)) => Some(stripes.bulk_read(keys.iter().map(Vec::as_slice))),
            _ => None,
        };
        keys.into_iter()
            .map(|key| {
                let value = self.get_unlocked(view, &key, exists_almost_certainly)?;
                Ok((key, value))
            })
            .collect()
    }

    pub(crate) fn put_window(
        &self,
        entries: Vec<(Key, Value)>,
        get_old_values: bool,
    ) -> Result<Vec<Option<Value>>> {
        let _guard = self
            .stripes
            .as_ref()
            .map(|stripes| stripes.bulk_write(entries.iter().map(|(k, _)| k.as_slice())));

        let previous = if get_old_values {
            let mut previous = Vec::with_capacity(entries.len());
            let mut written: Vec<(&[u8], &[u8])> = Vec::new();
            for (key, value) in &entries {
                // A duplicate earlier in this window shadows the stored value.
                let shadowed = written
                    .iter()
                    .rev()
                    .find(|(k, _)| *k == key.as_slice())
                    .map(|(_, v)| v.to_vec());
                let old = match shadowed {
                    Some(old) => Some(old),
                    None => self.get_unlocked(ReadView::Latest, key, false)?,
                };
                previous.push(old);
                written.push((key.as_slice(), value.as_slice()));
            }
            previous
        } else {
            vec![None; entries.len()]
        };

        let count = entries.len();
        let mut batch = CappedWriteBatch::new(
            self.engine.as_ref(),
            self.column,
            self.config.write_batch_cap,
            self.config.max_write_batch_bytes,
        );
        let first = entries.first().map(|(k, _)| k.clone()).unwrap_or_default();
        for (key, value) in entries {
            batch.put(key, value).map_err(|e| Error::io("write", KeyDisplay(&first), e))?;
        }
        batch.finish().map_err(|e| Error::io("write", KeyDisplay(&first), e))?;
        trace!(dictionary = %self.name, entries = count, "Wrote window");
        Ok(previous)
    }
}

impl Dictionary {
    /// Look up a stream of keys.
    ///
    /// Emits one `(key, value)` pair per input key, in input order. Reads at
    /// the latest state hold every stripe of a window shared for the
    /// duration of that window's reads.
    pub fn get_multi<S>(
        &self,
        snapshot: Option<SnapshotToken>,
        keys: S,
        exists_almost_certainly: bool,
    ) -> ResultStream<(Key, Option<Value>)>
    where
        S: Stream<Item = Key> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let config = &self.inner.config;
        let batches = windows(keys, config.multi_get_window, config.window_max_bytes, Vec::len)
            .then(move |window| {
                let inner = Arc::clone(&inner);
                async move {
                    let pool = inner.pool.clone();
                    pool.run(move || inner.get_window(snapshot, window, exists_almost_certainly))
                        .await
                }
            })
            .boxed();
        flatten_batches(batches)
    }

    /// Write a stream of entries.
    ///
    /// Emits one item per input entry, in input order: the value the key held
    /// just before this entry was applied when `get_old_values` is set,
    /// otherwise `None`.
    pub fn put_multi<S>(&self, entries: S, get_old_values: bool) -> ResultStream<Option<Value>>
    where
        S: Stream<Item = (Key, Value)> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let config = &self.inner.config;
        let batches = windows(entries, config.multi_get_window, config.window_max_bytes, entry_size)
            .then(move |window| {
                let inner = Arc::clone(&inner);
                async move {
                    let pool = inner.pool.clone();
                    pool.run(move || inner.put_window(window, get_old_values)).await
                }
            })
            .boxed();
        flatten_batches(batches)
    }
}
