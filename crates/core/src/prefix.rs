//! Prefix/suffix range arithmetic
//!
//! Nested maps store their entries under composite keys
//! `prefix ++ suffix ++ extension`, each part of fixed width. The sub-range
//! owned by one prefix is the half-open interval
//! `[first_range_key(prefix), next_range_key(prefix))`.
//!
//! # Overflow
//!
//! When the prefix is all `0xFF` there is no same-width successor. The upper
//! bound then becomes `0xFF` repeated over the full key width followed by a
//! single `0x00`. Every full-width key starting with the all-`0xFF` prefix is
//! a strict prefix of (or smaller than) that sentinel, so the bound stays
//! exclusive and tight.

use crate::error::{Error, Result};
use crate::range::KeyRange;
use crate::types::Key;
use serde::{Deserialize, Serialize};

/// Widths of the three key components of a nested map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLayout {
    /// Prefix width in bytes
    pub prefix_len: usize,
    /// Suffix width in bytes
    pub suffix_len: usize,
    /// Extension width in bytes
    pub ext_len: usize,
}

impl KeyLayout {
    /// Create a layout
    pub const fn new(prefix_len: usize, suffix_len: usize, ext_len: usize) -> Self {
        Self {
            prefix_len,
            suffix_len,
            ext_len,
        }
    }

    /// Full key width.
    pub const fn key_len(&self) -> usize {
        self.prefix_len + self.suffix_len + self.ext_len
    }

    /// Width of everything after the prefix.
    pub const fn tail_len(&self) -> usize {
        self.suffix_len + self.ext_len
    }

    /// Layout of the child map addressed by one suffix of this map.
    ///
    /// The child's prefix is `prefix ++ suffix`; its own suffix is
    /// `child_suffix_len` bytes carved out of this layout's extension.
    pub fn child(&self, child_suffix_len: usize) -> Result<KeyLayout> {
        if child_suffix_len > self.ext_len {
            return Err(Error::InvalidArgument(format!(
                "child suffix length {} exceeds extension length {}",
                child_suffix_len, self.ext_len
            )));
        }
        Ok(KeyLayout::new(
            self.prefix_len + self.suffix_len,
            child_suffix_len,
            self.ext_len - child_suffix_len,
        ))
    }

    /// Inclusive lower bound of the prefix's sub-range: `prefix ++ zeros(S+E)`.
    pub fn first_range_key(&self, prefix: &[u8]) -> Result<Key> {
        self.check_len("prefix", prefix, self.prefix_len)?;
        Ok(zero_extend(prefix, self.tail_len()))
    }

    /// Exclusive upper bound of the prefix's sub-range.
    ///
    /// Increments `prefix` as a big-endian unsigned integer and pads with
    /// `S+E` zeros, or returns the overflow sentinel when the prefix is all
    /// `0xFF`.
    pub fn next_range_key(&self, prefix: &[u8]) -> Result<Key> {
        self.check_len("prefix", prefix, self.prefix_len)?;
        Ok(increment_or_sentinel(prefix, self.tail_len(), self.key_len()))
    }

    /// Inclusive lower bound of one suffix under a prefix:
    /// `prefix ++ suffix ++ zeros(E)`.
    pub fn first_range_key_with_suffix(&self, prefix: &[u8], suffix: &[u8]) -> Result<Key> {
        self.check_len("prefix", prefix, self.prefix_len)?;
        self.check_len("suffix", suffix, self.suffix_len)?;
        let mut head = Vec::with_capacity(self.key_len());
        head.extend_from_slice(prefix);
        head.extend_from_slice(suffix);
        Ok(zero_extend(&head, self.ext_len))
    }

    /// Exclusive upper bound of one suffix under a prefix.
    ///
    /// Increments the combined `prefix ++ suffix` bytes; overflow yields the
    /// same sentinel as [`next_range_key`](Self::next_range_key).
    pub fn next_range_key_with_suffix(&self, prefix: &[u8], suffix: &[u8]) -> Result<Key> {
        self.check_len("prefix", prefix, self.prefix_len)?;
        self.check_len("suffix", suffix, self.suffix_len)?;
        let mut head = Vec::with_capacity(self.key_len());
        head.extend_from_slice(prefix);
        head.extend_from_slice(suffix);
        Ok(increment_or_sentinel(&head, self.ext_len, self.key_len()))
    }

    /// The half-open range owned by `prefix`.
    pub fn range(&self, prefix: &[u8]) -> Result<KeyRange> {
        KeyRange::between(self.first_range_key(prefix)?, self.next_range_key(prefix)?)
    }

    /// The half-open range owned by `prefix ++ suffix`.
    pub fn range_with_suffix(&self, prefix: &[u8], suffix: &[u8]) -> Result<KeyRange> {
        KeyRange::between(
            self.first_range_key_with_suffix(prefix, suffix)?,
            self.next_range_key_with_suffix(prefix, suffix)?,
        )
    }

    /// Validate a complete key for this layout.
    pub fn check_key(&self, key: &[u8]) -> Result<()> {
        self.check_len("key", key, self.key_len())
    }

    /// Validate the `suffix ++ extension` tail of a key.
    pub fn check_tail(&self, tail: &[u8]) -> Result<()> {
        self.check_len("key tail", tail, self.tail_len())
    }

    fn check_len(&self, what: &str, bytes: &[u8], expected: usize) -> Result<()> {
        if bytes.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "{} length {} does not match layout width {}",
                what,
                bytes.len(),
                expected
            )));
        }
        Ok(())
    }
}

/// `first_range_key` for a prefix of any width.
pub fn first_range_key(prefix: &[u8], suffix_len: usize, ext_len: usize) -> Key {
    zero_extend(prefix, suffix_len + ext_len)
}

/// `next_range_key` for a prefix of any width.
pub fn next_range_key(prefix: &[u8], suffix_len: usize, ext_len: usize) -> Key {
    let tail = suffix_len + ext_len;
    increment_or_sentinel(prefix, tail, prefix.len() + tail)
}

fn zero_extend(head: &[u8], zeros: usize) -> Key {
    let mut key = Vec::with_capacity(head.len() + zeros);
    key.extend_from_slice(head);
    key.resize(head.len() + zeros, 0);
    key
}

fn increment_or_sentinel(head: &[u8], zeros: usize, key_len: usize) -> Key {
    let mut bumped = head.to_vec();
    for byte in bumped.iter_mut().rev() {
        if *byte == 0xff {
            *byte = 0;
        } else {
            *byte += 1;
            return zero_extend(&bumped, zeros);
        }
    }
    // every byte carried out: head was all 0xFF (or empty)
    let mut sentinel = vec![0xffu8; key_len + 1];
    sentinel[key_len] = 0;
    sentinel
}
