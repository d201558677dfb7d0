//! Nested Map Integration Tests
//!
//! Prefix/suffix range arithmetic and `SubMap` partitioning of a dictionary.

#[path = "../common/mod.rs"]
mod common;

mod prefix_arithmetic;
mod submaps;
