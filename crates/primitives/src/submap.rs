//! Nested maps
//!
//! A [`SubMap`] is the slice of a dictionary whose keys start with one
//! fixed-width prefix. Keys inside it are addressed by their tail
//! (`suffix ++ extension`); the prefix is added on the way in and stripped
//! on the way out. Every tail has exactly `suffix_len + ext_len` bytes.
//!
//! ```text
//!  prefix (P)      suffix (S)      extension (E)
//! [ 00 00 01 ] [ 00 .. 00 2A ] [ 00 00 00 ]
//! '---------- child prefix ---'
//! ```
//!
//! A child map fixes one suffix and carves its own suffix out of the
//! extension, so maps nest as deep as the extension allows.

use futures::future;
use futures::stream::{Stream, StreamExt};
use keyspan_core::{
    Delta, Key, KeyLayout, KeyRange, Result, ResultType, SnapshotToken, UpdateReturnMode, Value,
};
use keyspan_engine::{Dictionary, EntryStream, KeyStream};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// One prefix of a dictionary viewed as a map of its own.
#[derive(Clone)]
pub struct SubMap {
    dict: Dictionary,
    prefix: Key,
    layout: KeyLayout,
    range: KeyRange,
}

impl SubMap {
    /// Map over every key of `dict`, which must all follow `layout` with a
    /// zero-width prefix.
    pub fn root(dict: Dictionary, suffix_len: usize, ext_len: usize) -> Result<Self> {
        Self::new(dict, Vec::new(), KeyLayout::new(0, suffix_len, ext_len))
    }

    /// Map over the keys of `dict` starting with `prefix`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `prefix` is not `layout.prefix_len` bytes long.
    pub fn new(dict: Dictionary, prefix: impl Into<Key>, layout: KeyLayout) -> Result<Self> {
        let prefix = prefix.into();
        let range = if layout.prefix_len == 0 {
            layout.first_range_key(&prefix)?;
            KeyRange::all()
        } else {
            layout.range(&prefix)?
        };
        Ok(Self {
            dict,
            prefix,
            layout,
            range,
        })
    }

    /// Prefix shared by every key of this map
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Key layout
    pub fn layout(&self) -> KeyLayout {
        self.layout
    }

    /// Dictionary range covered by this map
    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    /// Backing dictionary
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    fn full_key(&self, tail: &[u8]) -> Result<Key> {
        self.layout.check_tail(tail)?;
        let mut key = Vec::with_capacity(self.layout.key_len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(tail);
        Ok(key)
    }

    fn strip(prefix_len: usize, key: Key) -> Key {
        key.get(prefix_len..).map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// Read one tail.
    pub async fn get(&self, snapshot: Option<SnapshotToken>, tail: &[u8]) -> Result<Option<Value>> {
        let key = self.full_key(tail)?;
        self.dict.get(snapshot, key, false).await
    }

    /// Whether a tail is present.
    pub async fn contains(&self, snapshot: Option<SnapshotToken>, tail: &[u8]) -> Result<bool> {
        let key = self.full_key(tail)?;
        self.dict.contains_key(snapshot, key).await
    }

    /// Write one tail.
    pub async fn put(&self, tail: &[u8], value: impl Into<Value>, result_type: ResultType) -> Result<Option<Value>> {
        let key = self.full_key(tail)?;
        self.dict.put(key, value, result_type).await
    }

    /// Remove one tail.
    pub async fn remove(&self, tail: &[u8], result_type: ResultType) -> Result<Option<Value>> {
        let key = self.full_key(tail)?;
        self.dict.remove(key, result_type).await
    }

    /// Read-modify-write one tail. See [`Dictionary::update`].
    pub async fn update<F>(&self, tail: &[u8], updater: F, return_mode: UpdateReturnMode) -> Result<Option<Value>>
    where
        F: FnMut(Option<&[u8]>) -> Option<Value> + Send + 'static,
    {
        let key = self.full_key(tail)?;
        self.dict.update(key, updater, return_mode, false).await
    }

    /// Read-modify-write one tail, returning both sides of the change.
    pub async fn update_and_get_delta<F>(&self, tail: &[u8], updater: F) -> Result<Delta<Value>>
    where
        F: FnMut(Option<&[u8]>) -> Option<Value> + Send + 'static,
    {
        let key = self.full_key(tail)?;
        self.dict.update_and_get_delta(key, updater, false).await
    }

    /// Stream `(tail, value)` entries in ascending order.
    pub fn entries(&self, snapshot: Option<SnapshotToken>) -> EntryStream {
        let prefix_len = self.layout.prefix_len;
        self.dict
            .get_range(snapshot, self.range.clone())
            .map(move |item| item.map(|(key, value)| (Self::strip(prefix_len, key), value)))
            .boxed()
    }

    /// Stream tails in ascending order.
    pub fn keys(&self, snapshot: Option<SnapshotToken>) -> KeyStream {
        let prefix_len = self.layout.prefix_len;
        self.dict
            .get_range_keys(snapshot, self.range.clone())
            .map(move |item| item.map(|key| Self::strip(prefix_len, key)))
            .boxed()
    }

    /// Number of entries. See [`Dictionary::size_range`] for `fast`.
    pub async fn size(&self, snapshot: Option<SnapshotToken>, fast: bool) -> Result<u64> {
        self.dict.size_range(snapshot, self.range.clone(), fast).await
    }

    /// Whether the map holds no entries.
    pub async fn is_empty(&self, snapshot: Option<SnapshotToken>) -> Result<bool> {
        self.dict.is_range_empty(snapshot, self.range.clone()).await
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<()> {
        trace!(dictionary = %self.dict.name(), prefix_len = self.prefix.len(), "Clearing sub-map");
        if self.range.is_all() {
            self.dict.clear().await
        } else {
            self.dict
                .set_range(self.range.clone(), futures::stream::empty())
                .await
        }
    }

    /// Replace the whole map with `entries` given as `(tail, value)`.
    ///
    /// Entries stream through in windows like
    /// [`Dictionary::set_range`]. A malformed tail ends the input: the map is
    /// left holding the entries before it, and the call fails with
    /// `InvalidArgument`.
    pub async fn set_all<S>(&self, entries: S) -> Result<()>
    where
        S: Stream<Item = (Key, Value)> + Send + 'static,
    {
        let rejected = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&rejected);
        let map = self.clone();
        let full = entries.scan((), move |_, (tail, value)| {
            let entry = match map.full_key(&tail) {
                Ok(key) => Some((key, value)),
                Err(e) => {
                    *sink.lock() = Some(e);
                    None
                }
            };
            future::ready(entry)
        });
        self.dict.set_range(self.range.clone(), full).await?;
        let rejected = rejected.lock().take();
        match rejected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Child map addressed by `suffix`, with a `child_suffix_len`-byte
    /// suffix of its own taken from this map's extension.
    pub fn child(&self, suffix: &[u8], child_suffix_len: usize) -> Result<SubMap> {
        let layout = self.layout.child(child_suffix_len)?;
        self.layout.first_range_key_with_suffix(&self.prefix, suffix)?;
        let mut prefix = Vec::with_capacity(layout.prefix_len);
        prefix.extend_from_slice(&self.prefix);
        prefix.extend_from_slice(suffix);
        SubMap::new(self.dict.clone(), prefix, layout)
    }

    /// Stream the distinct suffixes present in this map, in ascending order.
    pub fn child_keys(&self, snapshot: Option<SnapshotToken>) -> KeyStream {
        let prefix_len = self.layout.prefix_len;
        self.dict
            .get_range_key_prefixes(
                snapshot,
                self.range.clone(),
                prefix_len + self.layout.suffix_len,
            )
            .map(move |item| item.map(|key| Self::strip(prefix_len, key)))
            .boxed()
    }
}

impl std::fmt::Debug for SubMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubMap")
            .field("dictionary", &self.dict.name())
            .field("prefix", &keyspan_core::KeyDisplay(&self.prefix))
            .field("layout", &self.layout)
            .finish()
    }
}
