//! Main database entry point for Keyspan.
//!
//! This module provides the `Keyspan` struct, the primary entry point for
//! opening dictionaries and nested maps.

use crate::error::{Error, Result};
use keyspan_concurrency::StoragePool;
use keyspan_core::{KeyLayout, SnapshotToken, UpdateMode};
use keyspan_engine::{Database, DatabaseBuilder, DatabaseConfig, Dictionary};
use keyspan_primitives::SubMap;
use keyspan_storage::KvEngine;
use std::path::Path;
use std::sync::Arc;

/// The Keyspan database.
///
/// Create one with [`Keyspan::open_in_memory`] or [`Keyspan::builder`].
///
/// # Example
///
/// ```ignore
/// use keyspan::prelude::*;
///
/// let db = Keyspan::open_in_memory()?;
/// let users = db.dictionary("users", UpdateMode::Allow)?;
/// users.put(b"alice".to_vec(), b"1".to_vec(), ResultType::Void).await?;
///
/// // Nested map: 4-byte tenant prefix, 8-byte ids, no extension
/// let tenant = db.nested_map("by-tenant", vec![0, 0, 0, 7], KeyLayout::new(4, 8, 0))?;
/// tenant.put(&42u64.to_be_bytes(), b"row".to_vec(), ResultType::Void).await?;
///
/// db.close()?;
/// ```
#[derive(Clone)]
pub struct Keyspan {
    inner: Arc<Database>,
}

impl Keyspan {
    /// Open an in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for database configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Keyspan::builder()
    ///     .name("cache")
    ///     .config(DatabaseConfig::low_memory())
    ///     .open()?;
    /// ```
    pub fn builder() -> KeyspanBuilder {
        KeyspanBuilder::new()
    }

    fn from_engine(inner: Database) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Open (creating if missing) a dictionary.
    pub fn dictionary(&self, name: &str, update_mode: UpdateMode) -> Result<Dictionary> {
        Ok(self.inner.dictionary(name, update_mode)?)
    }

    /// Open the nested map stored under `prefix` in dictionary `name`.
    ///
    /// The dictionary is opened with [`UpdateMode::Allow`] so the map supports
    /// `update`.
    pub fn nested_map(&self, name: &str, prefix: impl Into<Vec<u8>>, layout: KeyLayout) -> Result<SubMap> {
        let dict = self.inner.dictionary(name, UpdateMode::Allow)?;
        Ok(SubMap::new(dict, prefix, layout)?)
    }

    /// Pin the current state of every dictionary.
    pub async fn take_snapshot(&self) -> Result<SnapshotToken> {
        Ok(self.inner.take_snapshot().await?)
    }

    /// Release a snapshot taken with [`take_snapshot`](Self::take_snapshot).
    pub async fn release_snapshot(&self, token: SnapshotToken) -> Result<()> {
        Ok(self.inner.release_snapshot(token).await?)
    }

    /// Persist buffered state.
    pub fn flush(&self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    /// Graceful shutdown. Later operations fail with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        Ok(self.inner.close()?)
    }

    /// Database name
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Active configuration
    pub fn config(&self) -> &DatabaseConfig {
        self.inner.config()
    }

    /// Underlying store database
    pub fn database(&self) -> &Database {
        &self.inner
    }
}

impl std::fmt::Debug for Keyspan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspan").field("database", &self.inner).finish()
    }
}

/// Builder for [`Keyspan`].
pub struct KeyspanBuilder {
    inner: DatabaseBuilder,
}

impl KeyspanBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            inner: DatabaseBuilder::new(),
        }
    }

    /// Set the database name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.name(name);
        self
    }

    /// Use an explicit configuration.
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.inner = self.inner.config(config);
        self
    }

    /// Load the configuration from a TOML file.
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = DatabaseConfig::from_file(path).map_err(Error::from)?;
        Ok(self.config(config))
    }

    /// Use an existing storage engine.
    pub fn engine(mut self, engine: Arc<dyn KvEngine>) -> Self {
        self.inner = self.inner.engine(engine);
        self
    }

    /// Run blocking work on an existing pool.
    pub fn pool(mut self, pool: StoragePool) -> Self {
        self.inner = self.inner.pool(pool);
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Keyspan> {
        let db = self.inner.open().map_err(Error::from)?;
        Ok(Keyspan::from_engine(db))
    }
}

impl Default for KeyspanBuilder {
    fn default() -> Self {
        Self::new()
    }
}
