//! Dictionary Integration Tests
//!
//! End-to-end behaviour of `Dictionary` through the public facade:
//! point operations, the update protocol, multi-key windows, range reads and
//! writes, snapshots, and concurrent access.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test dictionary
//! cargo test --test dictionary concurrency::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod multi_ops;
mod point_ops;
mod range_ops;
mod snapshots;
mod update;
