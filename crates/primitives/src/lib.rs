//! Higher-level structures for Keyspan
//!
//! - SubMap: a nested map living inside one prefix of a dictionary, addressed
//!   by fixed-width `suffix ++ extension` tails

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod submap;

pub use submap::SubMap;
