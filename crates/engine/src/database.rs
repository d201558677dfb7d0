//! Database
//!
//! A [`Database`] owns one engine, one storage pool and one snapshot
//! registry, and hands out [`Dictionary`] handles that share them.
//!
//! # Example
//!
//! ```ignore
//! let db = Database::builder()
//!     .name("accounts")
//!     .config(DatabaseConfig::low_memory())
//!     .open()?;
//! let dict = db.dictionary("balances", UpdateMode::Allow)?;
//! let snapshot = db.take_snapshot().await?;
//! // ... reads at `snapshot` ...
//! db.release_snapshot(snapshot).await?;
//! db.close()?;
//! ```

use crate::config::DatabaseConfig;
use crate::dictionary::{Dictionary, DictionaryInner};
use crate::snapshot::SnapshotRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keyspan_concurrency::{StoragePool, StripedLocks};
use keyspan_core::{Error, Result, SnapshotToken, UpdateMode};
use keyspan_storage::{KvEngine, MemoryEngine, MemoryEngineOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn reuse(name: &str, existing: &Dictionary, update_mode: UpdateMode) -> Result<Dictionary> {
    if existing.update_mode() != update_mode {
        return Err(Error::InvalidArgument(format!(
            "dictionary {} is already open with update mode {:?}",
            name,
            existing.update_mode()
        )));
    }
    Ok(existing.clone())
}

/// Default database name
pub const DEFAULT_NAME: &str = "keyspan";

/// Engine, worker pool and snapshots shared by a set of dictionaries.
pub struct Database {
    name: String,
    engine: Arc<dyn KvEngine>,
    pool: StoragePool,
    owns_pool: bool,
    snapshots: Arc<SnapshotRegistry>,
    config: Arc<DatabaseConfig>,
    dictionaries: DashMap<String, Dictionary>,
    closed: AtomicBool,
}

impl Database {
    /// Create a builder.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open an in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::builder().open()
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Storage pool running this database's blocking work
    pub fn pool(&self) -> &StoragePool {
        &self.pool
    }

    /// Underlying engine
    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Open (creating if missing) the dictionary `name`.
    ///
    /// The update mode is fixed by the first open; reopening under another
    /// mode fails with `InvalidArgument`.
    pub fn dictionary(&self, name: &str, update_mode: UpdateMode) -> Result<Dictionary> {
        self.check_open()?;
        if let Some(existing) = self.dictionaries.get(name) {
            return reuse(name, existing.value(), update_mode);
        }

        match self.dictionaries.entry(name.to_string()) {
            Entry::Occupied(occupied) => reuse(name, occupied.get(), update_mode),
            Entry::Vacant(vacant) => {
                let column = self
                    .engine
                    .create_column(name)
                    .map_err(|e| Error::io("open column", name, e))?;
                let stripes = match update_mode {
                    UpdateMode::Allow => Some(StripedLocks::new(self.config.stripes)),
                    UpdateMode::Disallow => None,
                };
                let dictionary = Dictionary::from_inner(DictionaryInner {
                    name: name.to_string(),
                    database_name: self.name.clone(),
                    engine: Arc::clone(&self.engine),
                    column,
                    update_mode,
                    stripes,
                    snapshots: Arc::clone(&self.snapshots),
                    pool: self.pool.clone(),
                    config: Arc::clone(&self.config),
                });
                debug!(database = %self.name, dictionary = name, ?update_mode, ?column, "Opened dictionary");
                Ok(vacant.insert(dictionary).clone())
            }
        }
    }

    /// Names of the dictionaries opened so far
    pub fn dictionary_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dictionaries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Pin the current state of every dictionary of this database.
    pub async fn take_snapshot(&self) -> Result<SnapshotToken> {
        self.check_open()?;
        let snapshots = Arc::clone(&self.snapshots);
        self.pool.run(move || snapshots.take()).await
    }

    /// Release a snapshot. Unknown or already released tokens fail with
    /// `SnapshotNotFound`.
    pub async fn release_snapshot(&self, token: SnapshotToken) -> Result<()> {
        let snapshots = Arc::clone(&self.snapshots);
        self.pool.run(move || snapshots.release(token)).await
    }

    /// Number of unreleased snapshots
    pub fn live_snapshots(&self) -> usize {
        self.snapshots.live_count()
    }

    /// Persist buffered engine state.
    pub fn flush(&self) -> Result<()> {
        self.check_open()?;
        self.engine
            .flush()
            .map_err(|e| Error::io("flush", &self.name, e))
    }

    /// Release outstanding snapshots and close the engine, stopping the pool
    /// unless it was supplied through [`DatabaseBuilder::pool`].
    ///
    /// Idempotent. Operations issued afterwards fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.owns_pool {
            self.pool.close();
        }
        let outstanding = self.snapshots.live_count();
        if outstanding > 0 {
            debug!(database = %self.name, outstanding, "Releasing outstanding snapshots");
        }
        self.snapshots.release_all();
        let flushed = self
            .engine
            .flush()
            .map_err(|e| Error::io("flush", &self.name, e));
        self.engine.close();
        info!(database = %self.name, "Closed database");
        flushed
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.close() {
                warn!(database = %self.name, error = %e, "Close on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("engine", &self.engine.name())
            .field("dictionaries", &self.dictionaries.len())
            .field("snapshots", &self.snapshots.live_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`Database`].
///
/// Without an explicit engine, an in-memory engine is created from the
/// configuration; without an explicit pool, one is sized from it.
pub struct DatabaseBuilder {
    name: String,
    config: DatabaseConfig,
    engine: Option<Arc<dyn KvEngine>>,
    pool: Option<StoragePool>,
}

impl DatabaseBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            config: DatabaseConfig::default(),
            engine: None,
            pool: None,
        }
    }

    /// Set the database name used in logs and error contexts.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the configuration.
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing engine.
    pub fn engine(mut self, engine: Arc<dyn KvEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Run blocking work on an existing pool, possibly shared with other
    /// databases.
    pub fn pool(mut self, pool: StoragePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate the configuration and open the database.
    pub fn open(self) -> Result<Database> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                let options = MemoryEngineOptions {
                    bloom_capacity: config.bloom_capacity,
                    cursor_chunk: config.cursor_chunk,
                    native_delete_range: config.native_delete_range,
                };
                Arc::new(MemoryEngine::with_options(options)) as Arc<dyn KvEngine>
            }
        };
        let owns_pool = self.pool.is_none();
        let pool = self.pool.unwrap_or_else(|| {
            StoragePool::new(
                format!("{}-storage", self.name),
                config.max_concurrent_ops,
                config.max_concurrent_scans,
            )
        });
        info!(database = %self.name, engine = engine.name(), "Opened database");
        Ok(Database {
            name: self.name,
            snapshots: Arc::new(SnapshotRegistry::new(Arc::clone(&engine))),
            engine,
            pool,
            owns_pool,
            config,
            dictionaries: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
