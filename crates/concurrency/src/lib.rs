//! Concurrency layer for Keyspan
//!
//! This crate provides the synchronization the dictionary store is built on:
//! - StampedLock: shared/exclusive lock with a non-blocking read-to-write upgrade
//! - StripedLocks: fixed array of stamped locks addressed by key hash
//! - StoragePool: bounded worker pool that runs blocking engine calls

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pool;
pub mod stamped;
pub mod striped;

pub use pool::StoragePool;
pub use stamped::{StampGuard, StampMode, StampedLock};
pub use striped::{BulkGuard, StripedLocks, DEFAULT_STRIPES};
