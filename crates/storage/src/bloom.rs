//! Bloom filter
//!
//! Answers "might this key exist?" without touching the key map.
//! `false` means definitely absent; `true` means probably present.
//!
//! Sizing:
//!   bits_per_key = -1.44 * log2(false_positive_rate)
//!   num_hashes   = bits_per_key * ln(2)
//!
//! Positions use double hashing, `h1 + i * h2 (mod m)`, with h1/h2 the two
//! halves of one xxh3-128 hash.

use xxhash_rust::xxh3::xxh3_128;

/// Probabilistic set membership over byte keys.
#[derive(Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u64,
    capacity: usize,
    inserted: usize,
}

impl BloomFilter {
    /// Create a filter sized for `expected_items` at `false_positive_rate`.
    ///
    /// Out-of-range arguments are clamped: at least one item, and a rate
    /// inside `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let fpr = if false_positive_rate > 0.0 && false_positive_rate < 1.0 {
            false_positive_rate
        } else {
            0.01
        };

        let bits_per_key = -1.44 * fpr.log2();
        let num_bits = (((expected_items as f64) * bits_per_key).ceil() as u64).max(64);
        let num_hashes = ((bits_per_key * 2.0f64.ln()).ceil() as u32).max(1);
        let words = ((num_bits + 63) / 64) as usize;

        Self {
            bits: vec![0u64; words],
            num_hashes,
            num_bits,
            capacity: expected_items,
            inserted: 0,
        }
    }

    /// Add a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_key(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1u64 << (pos % 64);
        }
        self.inserted += 1;
    }

    /// Check whether a key might be present.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_key(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.position(h1, h2, i);
            self.bits[(pos / 64) as usize] & (1u64 << (pos % 64)) != 0
        })
    }

    /// True once more keys were inserted than the filter was sized for.
    pub fn is_saturated(&self) -> bool {
        self.inserted > self.capacity
    }

    /// Number of insert calls
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Number of items the filter was sized for
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn position(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}

#[inline]
fn hash_key(key: &[u8]) -> (u64, u64) {
    let h = xxh3_128(key);
    (h as u64, (h >> 64) as u64)
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("inserted", &self.inserted)
            .field("capacity", &self.capacity)
            .finish()
    }
}
