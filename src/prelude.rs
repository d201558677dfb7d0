//! Convenient imports for Keyspan.
//!
//! ```ignore
//! use keyspan::prelude::*;
//!
//! let db = Keyspan::open_in_memory()?;
//! let dict = db.dictionary("d", UpdateMode::Allow)?;
//! ```

// Main entry point
pub use crate::database::{Keyspan, KeyspanBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Store handles
pub use keyspan_engine::{DatabaseConfig, Dictionary};
pub use keyspan_primitives::SubMap;

// Core types
pub use keyspan_core::{
    Delta, Key, KeyLayout, KeyRange, ResultType, SnapshotToken, UpdateMode, UpdateReturnMode,
    Value,
};

// Stream combinators for consuming range results
pub use futures::StreamExt;
