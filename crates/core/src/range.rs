//! Key ranges
//!
//! A [`KeyRange`] expresses "one key", "every key" and "a bounded interval"
//! with a single type. Bounds are optional; when both are present the range
//! is half-open `[min, max)`, except that `min == max` denotes the single key
//! `min`.

use crate::error::{Error, Result};
use crate::types::{Key, KeyDisplay};
use std::fmt;

/// Interval of keys under unsigned lexicographic ordering.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyRange {
    min: Option<Key>,
    max: Option<Key>,
}

impl KeyRange {
    /// Every key.
    pub fn all() -> Self {
        Self { min: None, max: None }
    }

    /// Exactly one key.
    pub fn single(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            min: Some(key.clone()),
            max: Some(key),
        }
    }

    /// `[min, max)`. Fails when `min > max`.
    pub fn between(min: impl Into<Key>, max: impl Into<Key>) -> Result<Self> {
        Self::new(Some(min.into()), Some(max.into()))
    }

    /// `[min, ∞)`
    pub fn at_least(min: impl Into<Key>) -> Self {
        Self {
            min: Some(min.into()),
            max: None,
        }
    }

    /// `(-∞, max)`
    pub fn below(max: impl Into<Key>) -> Self {
        Self {
            min: None,
            max: Some(max.into()),
        }
    }

    /// Build from optional bounds, validating their order.
    pub fn new(min: Option<Key>, max: Option<Key>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo > hi {
                return Err(Error::InvalidArgument(format!(
                    "range min {} is greater than max {}",
                    KeyDisplay(lo),
                    KeyDisplay(hi)
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// Whether a lower bound is set
    pub fn has_min(&self) -> bool {
        self.min.is_some()
    }

    /// Whether an upper bound is set
    pub fn has_max(&self) -> bool {
        self.max.is_some()
    }

    /// Inclusive lower bound
    pub fn min(&self) -> Option<&[u8]> {
        self.min.as_deref()
    }

    /// Exclusive upper bound (inclusive for single ranges)
    pub fn max(&self) -> Option<&[u8]> {
        self.max.as_deref()
    }

    /// True for a point range.
    pub fn is_single(&self) -> bool {
        matches!((&self.min, &self.max), (Some(lo), Some(hi)) if lo == hi)
    }

    /// True when neither bound is set.
    pub fn is_all(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// The key of a point range.
    pub fn single_key(&self) -> Option<&[u8]> {
        if self.is_single() {
            self.min()
        } else {
            None
        }
    }

    /// Membership test.
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(single) = self.single_key() {
            return key == single;
        }
        let above_min = self.min().map_or(true, |lo| key >= lo);
        let below_max = self.max().map_or(true, |hi| key < hi);
        above_min && below_max
    }

    /// True if `key` lies past the upper bound.
    pub fn is_past_end(&self, key: &[u8]) -> bool {
        if let Some(single) = self.single_key() {
            return key > single;
        }
        self.max().map_or(false, |hi| key >= hi)
    }

    /// Consume into raw bounds.
    pub fn into_bounds(self) -> (Option<Key>, Option<Key>) {
        (self.min, self.max)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = self.single_key() {
            return write!(f, "[{}]", KeyDisplay(key));
        }
        match self.min() {
            Some(lo) => write!(f, "[{}", KeyDisplay(lo))?,
            None => write!(f, "(-inf")?,
        }
        match self.max() {
            Some(hi) => write!(f, ", {})", KeyDisplay(hi)),
            None => write!(f, ", +inf)"),
        }
    }
}

impl fmt::Debug for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyRange{}", self)
    }
}
