//! Snapshot registry
//!
//! Maps opaque tokens to engine sequence pins. Tokens start at 1 and are
//! never reused; a released token resolves to `SnapshotNotFound`.

use dashmap::DashMap;
use keyspan_core::{Error, Result, SnapshotToken};
use keyspan_storage::{KvEngine, ReadView};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Live snapshots of one database.
pub struct SnapshotRegistry {
    engine: Arc<dyn KvEngine>,
    next_id: AtomicU64,
    live: DashMap<u64, u64>,
}

impl SnapshotRegistry {
    /// Create an empty registry over `engine`
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self {
            engine,
            next_id: AtomicU64::new(1),
            live: DashMap::new(),
        }
    }

    /// Pin the engine's current state under a new token.
    pub fn take(&self) -> Result<SnapshotToken> {
        let sequence = self
            .engine
            .snapshot()
            .map_err(|e| Error::io("snapshot", self.engine.name(), e))?;
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.live.insert(id, sequence);
        debug!(snapshot = id, sequence, "Took snapshot");
        Ok(SnapshotToken(id))
    }

    /// Unpin a snapshot. Fails if the token is unknown or already released.
    pub fn release(&self, token: SnapshotToken) -> Result<()> {
        match self.live.remove(&token.0) {
            Some((_, sequence)) => {
                self.engine.release_snapshot(sequence);
                debug!(snapshot = token.0, sequence, "Released snapshot");
                Ok(())
            }
            None => {
                warn!(snapshot = token.0, "Release of unknown snapshot");
                Err(Error::SnapshotNotFound(token.0))
            }
        }
    }

    /// Read view for an optional token.
    pub fn resolve(&self, token: Option<SnapshotToken>) -> Result<ReadView> {
        match token {
            None => Ok(ReadView::Latest),
            Some(token) => self
                .live
                .get(&token.0)
                .map(|entry| ReadView::At(*entry.value()))
                .ok_or(Error::SnapshotNotFound(token.0)),
        }
    }

    /// Number of unreleased snapshots
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Release every outstanding snapshot.
    pub fn release_all(&self) {
        let ids: Vec<u64> = self.live.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, sequence)) = self.live.remove(&id) {
                self.engine.release_snapshot(sequence);
            }
        }
    }
}

/// Engine sequence pinned for the life of the guard.
///
/// Used for reads that need one consistent view across several pool tasks
/// without registering a token. Dropping the guard unpins the sequence, so a
/// cancelled caller cannot leak it.
pub(crate) struct EnginePin {
    engine: Arc<dyn KvEngine>,
    sequence: u64,
}

impl EnginePin {
    /// Pin the engine's current state. Blocks; call from the pool.
    pub(crate) fn acquire(engine: Arc<dyn KvEngine>) -> Result<Self> {
        let sequence = engine
            .snapshot()
            .map_err(|e| Error::io("snapshot", engine.name(), e))?;
        Ok(Self { engine, sequence })
    }

    pub(crate) fn view(&self) -> ReadView {
        ReadView::At(self.sequence)
    }
}

impl Drop for EnginePin {
    fn drop(&mut self) {
        self.engine.release_snapshot(self.sequence);
    }
}

impl std::fmt::Debug for SnapshotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRegistry")
            .field("live", &self.live.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
