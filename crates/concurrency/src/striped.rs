//! Lock striping
//!
//! Keys hash into a fixed array of [`StampedLock`]s. Distinct keys sharing a
//! stripe contend spuriously, which costs throughput but never correctness.
//!
//! Multi-key operations lock the sorted, de-duplicated set of stripes their
//! keys map to. Every caller acquires stripes in ascending index order, so
//! bulk acquisitions cannot deadlock against each other.

use crate::stamped::{StampGuard, StampedLock};
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_64;

/// Default stripe count
pub const DEFAULT_STRIPES: usize = 512;

/// Fixed array of stamped locks addressed by key hash.
pub struct StripedLocks {
    stripes: Box<[StampedLock]>,
}

impl StripedLocks {
    /// Create `count` stripes (at least one).
    pub fn new(count: usize) -> Self {
        let stripes = (0..count.max(1)).map(|_| StampedLock::new()).collect();
        Self { stripes }
    }

    /// Number of stripes
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    /// Always false; there is at least one stripe
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Stripe index of a key.
    #[inline]
    pub fn index_of(&self, key: &[u8]) -> usize {
        (xxh3_64(key) % self.stripes.len() as u64) as usize
    }

    /// Lock guarding a key
    pub fn get(&self, key: &[u8]) -> &StampedLock {
        &self.stripes[self.index_of(key)]
    }

    /// Shared access to a key's stripe
    pub fn read(&self, key: &[u8]) -> StampGuard<'_> {
        self.get(key).read()
    }

    /// Exclusive access to a key's stripe
    pub fn write(&self, key: &[u8]) -> StampGuard<'_> {
        self.get(key).write()
    }

    /// Sorted, de-duplicated stripe indices for a set of keys.
    pub fn indices<'k, I>(&self, keys: I) -> SmallVec<[usize; 16]>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let mut indices: SmallVec<[usize; 16]> = keys.into_iter().map(|k| self.index_of(k)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Shared access to every stripe touched by `keys`.
    pub fn bulk_read<'k, I>(&self, keys: I) -> BulkGuard<'_>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let guards = self
            .indices(keys)
            .into_iter()
            .map(|i| self.stripes[i].read())
            .collect();
        BulkGuard { guards }
    }

    /// Exclusive access to every stripe touched by `keys`.
    pub fn bulk_write<'k, I>(&self, keys: I) -> BulkGuard<'_>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let guards = self
            .indices(keys)
            .into_iter()
            .map(|i| self.stripes[i].write())
            .collect();
        BulkGuard { guards }
    }
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl std::fmt::Debug for StripedLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

/// Guards over several stripes. Released together on drop.
pub struct BulkGuard<'a> {
    guards: Vec<StampGuard<'a>>,
}

impl BulkGuard<'_> {
    /// Number of stripes held
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// True if no stripe is held
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}
