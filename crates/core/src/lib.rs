//! Core types for Keyspan
//!
//! This crate defines the vocabulary shared by every other layer:
//! - Key/Value byte buffers and their unsigned lexicographic ordering
//! - KeyRange: all / single / half-open intervals over keys
//! - KeyLayout: prefix/suffix/extension arithmetic for nested maps
//! - UpdateMode, ResultType, UpdateReturnMode, Delta
//! - Error types for engine and dictionary failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod prefix;
pub mod range;
pub mod types;

pub use error::{EngineError, EngineResult, Error, ErrorKind, Result};
pub use prefix::{first_range_key, next_range_key, KeyLayout};
pub use range::KeyRange;
pub use types::{
    Delta, Key, KeyDisplay, ResultType, SnapshotToken, UpdateAction, UpdateMode,
    UpdateReturnMode, Value,
};
