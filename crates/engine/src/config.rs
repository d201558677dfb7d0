//! Database configuration
//!
//! Every knob has a default matching the store's reference constants, so an
//! empty TOML document is a valid configuration:
//!
//! ```toml
//! max_concurrent_ops = 64
//! multi_get_window = 500
//! fast_size_scan_cap = 100000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading/validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML did not parse into a configuration
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for keyspan_core::Error {
    fn from(e: ConfigError) -> Self {
        keyspan_core::Error::InvalidArgument(e.to_string())
    }
}

/// Tuning for a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Concurrent blocking point/window operations
    pub max_concurrent_ops: usize,
    /// Concurrent range-scan producers
    pub max_concurrent_scans: usize,
    /// Lock stripes per dictionary
    pub stripes: usize,
    /// Entries per multi-key window
    pub multi_get_window: usize,
    /// Bytes per multi-key window
    pub window_max_bytes: usize,
    /// Operations per engine batch before auto-flush
    pub write_batch_cap: usize,
    /// Bytes per engine batch before auto-flush
    pub max_write_batch_bytes: usize,
    /// Scan cap for fast all-range sizing at a snapshot
    pub fast_size_scan_cap: u64,
    /// Disjoint shards used by exact all-range sizing
    pub exact_size_shards: usize,
    /// Items buffered between a range producer and its consumer
    pub stream_buffer: usize,
    /// Use native range deletes when the engine has them
    pub native_delete_range: bool,
    /// Initial bloom filter capacity per column (in-memory engine)
    pub bloom_capacity: usize,
    /// Entries fetched per cursor refill (in-memory engine)
    pub cursor_chunk: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map_or(4, |n| n.get());
        Self {
            max_concurrent_ops: cpus * 4,
            max_concurrent_scans: cpus * 2,
            stripes: 512,
            multi_get_window: 500,
            window_max_bytes: 2 * 1024 * 1024,
            write_batch_cap: 50_000,
            max_write_batch_bytes: 1024 * 1024 * 1024,
            fast_size_scan_cap: 100_000,
            exact_size_shards: 16,
            stream_buffer: 256,
            native_delete_range: true,
            bloom_capacity: 4096,
            cursor_chunk: 128,
        }
    }
}

impl DatabaseConfig {
    /// Small windows and buffers for constrained environments.
    pub fn low_memory() -> Self {
        Self {
            multi_get_window: 64,
            window_max_bytes: 256 * 1024,
            write_batch_cap: 4096,
            max_write_batch_bytes: 16 * 1024 * 1024,
            stream_buffer: 32,
            bloom_capacity: 512,
            ..Self::default()
        }
    }

    /// Settings for tests: tiny windows so window boundaries are exercised.
    pub fn for_testing() -> Self {
        Self {
            max_concurrent_ops: 8,
            max_concurrent_scans: 4,
            stripes: 16,
            multi_get_window: 4,
            window_max_bytes: 64,
            write_batch_cap: 8,
            fast_size_scan_cap: 50,
            exact_size_shards: 4,
            stream_buffer: 2,
            cursor_chunk: 3,
            ..Self::default()
        }
    }

    /// Parse from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DatabaseConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject zero-sized limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_concurrent_ops", self.max_concurrent_ops),
            ("max_concurrent_scans", self.max_concurrent_scans),
            ("stripes", self.stripes),
            ("multi_get_window", self.multi_get_window),
            ("window_max_bytes", self.window_max_bytes),
            ("write_batch_cap", self.write_batch_cap),
            ("max_write_batch_bytes", self.max_write_batch_bytes),
            ("exact_size_shards", self.exact_size_shards),
            ("stream_buffer", self.stream_buffer),
            ("cursor_chunk", self.cursor_chunk),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }
        if self.exact_size_shards > 256 {
            return Err(ConfigError::Invalid(
                "exact_size_shards cannot exceed 256".to_string(),
            ));
        }
        Ok(())
    }
}
