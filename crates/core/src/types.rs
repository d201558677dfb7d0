//! Shared value types
//!
//! Keys and values are owned byte buffers. Ordering is the unsigned
//! lexicographic ordering of `[u8]`: bytes compare as 0..=255 and a strict
//! prefix sorts before any longer key it prefixes.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dictionary key.
pub type Key = Vec<u8>;

/// Dictionary value.
pub type Value = Vec<u8>;

/// Handle to an immutable point-in-time read view.
///
/// Tokens are issued by the database starting at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotToken(pub u64);

impl SnapshotToken {
    /// Numeric id of this token
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot#{}", self.0)
    }
}

// ============================================================================
// Modes
// ============================================================================

/// Whether a dictionary engages per-key locking and allows `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// No `update`, no striped locks
    Disallow,
    /// `update` allowed, every write goes through the key's stripe
    #[default]
    Allow,
}

/// What `put`/`remove` report about the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Nothing; the previous value is not read
    #[default]
    Void,
    /// The previous value
    PreviousValue,
    /// `[1]` if a previous value existed, `[0]` otherwise
    PreviousValueExistence,
}

impl ResultType {
    /// Whether the previous value must be read to answer.
    pub fn needs_previous(self) -> bool {
        !matches!(self, ResultType::Void)
    }

    /// Shape a previous value according to this result type.
    pub fn project(self, previous: Option<Value>) -> Option<Value> {
        match self {
            ResultType::Void => None,
            ResultType::PreviousValue => previous,
            ResultType::PreviousValueExistence => Some(vec![previous.is_some() as u8]),
        }
    }
}

impl TryFrom<u8> for ResultType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ResultType::Void),
            1 => Ok(ResultType::PreviousValue),
            2 => Ok(ResultType::PreviousValueExistence),
            other => Err(Error::InvalidArgument(format!("unknown result type {}", other))),
        }
    }
}

/// What `update` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateReturnMode {
    /// Value before the update
    OldValue,
    /// Value after the update
    #[default]
    NewValue,
    /// Nothing
    Nothing,
}

impl TryFrom<u8> for UpdateReturnMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UpdateReturnMode::OldValue),
            1 => Ok(UpdateReturnMode::NewValue),
            2 => Ok(UpdateReturnMode::Nothing),
            other => Err(Error::InvalidArgument(format!(
                "unknown update return mode {}",
                other
            ))),
        }
    }
}

// ============================================================================
// Delta
// ============================================================================

/// Previous and current value of a key around one update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delta<V> {
    /// Value before the update
    pub previous: Option<V>,
    /// Value after the update
    pub current: Option<V>,
}

impl<V: PartialEq> Delta<V> {
    /// Create a delta
    pub fn new(previous: Option<V>, current: Option<V>) -> Self {
        Self { previous, current }
    }

    /// True if the update changed the stored value.
    pub fn is_modified(&self) -> bool {
        self.previous != self.current
    }

    /// Consume, keeping the previous value
    pub fn into_previous(self) -> Option<V> {
        self.previous
    }

    /// Consume, keeping the current value
    pub fn into_current(self) -> Option<V> {
        self.current
    }

    /// Map both sides
    pub fn map<U: PartialEq>(self, mut f: impl FnMut(V) -> U) -> Delta<U> {
        Delta {
            previous: self.previous.map(&mut f),
            current: self.current.map(&mut f),
        }
    }
}

impl Delta<Value> {
    /// Project by return mode.
    pub fn project(self, mode: UpdateReturnMode) -> Option<Value> {
        match mode {
            UpdateReturnMode::OldValue => self.previous,
            UpdateReturnMode::NewValue => self.current,
            UpdateReturnMode::Nothing => None,
        }
    }
}

/// Storage action implied by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Leave storage untouched
    NoOp,
    /// Write the new value
    Write,
    /// Delete the key
    Delete,
}

impl UpdateAction {
    /// Decide what an update from `previous` to `current` requires.
    pub fn decide(previous: Option<&[u8]>, current: Option<&[u8]>) -> Self {
        match (previous, current) {
            (Some(_), None) => UpdateAction::Delete,
            (None, Some(_)) => UpdateAction::Write,
            (Some(old), Some(new)) if old != new => UpdateAction::Write,
            _ => UpdateAction::NoOp,
        }
    }
}

// ============================================================================
// Display helpers
// ============================================================================

const DISPLAY_LIMIT: usize = 64;

/// Hex rendering of a key for logs and error messages, truncated past 64 bytes.
pub struct KeyDisplay<'a>(pub &'a [u8]);

impl fmt::Display for KeyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(DISPLAY_LIMIT)];
        for byte in shown {
            write!(f, "{:02x}", byte)?;
        }
        if self.0.len() > DISPLAY_LIMIT {
            write!(f, "...({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
