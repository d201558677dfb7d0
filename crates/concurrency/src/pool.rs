//! Storage worker pool
//!
//! Engine calls block, so they never run on async worker threads. The pool
//! hands each unit of work to `tokio::task::spawn_blocking` after taking a
//! permit from a bounded semaphore, which caps how many blocking engine calls
//! are in flight at once.
//!
//! Range scans draw from a separate permit budget: a consumer that stops
//! polling a stream keeps its producer parked, and those parked producers
//! must not starve point operations.
//!
//! # Shutdown
//!
//! [`StoragePool::close`] closes both semaphores. Work already running
//! completes; anything submitted afterwards fails with `Error::Closed`.

use keyspan_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

struct PoolInner {
    name: String,
    ops: Arc<Semaphore>,
    scans: Arc<Semaphore>,
    max_ops: usize,
    max_scans: usize,
}

/// Bounded pool for blocking storage work. Clones share the same budget.
#[derive(Clone)]
pub struct StoragePool {
    inner: Arc<PoolInner>,
}

impl StoragePool {
    /// Create a pool.
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in logs
    /// * `max_ops` - Concurrent point/window operations
    /// * `max_scans` - Concurrent range scan producers
    pub fn new(name: impl Into<String>, max_ops: usize, max_scans: usize) -> Self {
        let max_ops = max_ops.max(1);
        let max_scans = max_scans.max(1);
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                ops: Arc::new(Semaphore::new(max_ops)),
                scans: Arc::new(Semaphore::new(max_scans)),
                max_ops,
                max_scans,
            }),
        }
    }

    /// Pool sized from the available parallelism.
    pub fn with_default_size(name: impl Into<String>) -> Self {
        let cpus = std::thread::available_parallelism().map_or(4, |n| n.get());
        Self::new(name, cpus * 4, cpus * 2)
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Operation permits not currently in use
    pub fn available_ops(&self) -> usize {
        self.inner.ops.available_permits()
    }

    /// Scan permits not currently in use
    pub fn available_scans(&self) -> usize {
        self.inner.scans.available_permits()
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.inner.ops.is_closed()
    }

    /// Run a blocking closure on the pool and await its result.
    ///
    /// The closure runs to completion once started, even if the returned
    /// future is dropped.
    pub async fn run<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.inner.ops)
            .acquire_owned()
            .await
            .map_err(|_| Error::Closed)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| Error::Internal(format!("storage task failed: {}", e)))?
    }

    /// Start a blocking producer that feeds `tx`.
    ///
    /// The producer receives the sender and should stop once a send fails,
    /// which happens as soon as the consumer drops its receiver. A producer
    /// error is forwarded to the consumer as the final item.
    pub fn spawn_scan<T, F>(&self, tx: mpsc::Sender<Result<T>>, producer: F)
    where
        T: Send + 'static,
        F: FnOnce(&mpsc::Sender<Result<T>>) -> Result<()> + Send + 'static,
    {
        let scans = Arc::clone(&self.inner.scans);
        let pool = self.inner.name.clone();
        tokio::spawn(async move {
            let permit = match scans.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = tx.send(Err(Error::Closed)).await;
                    return;
                }
            };
            let report = tx.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                if let Err(e) = producer(&tx) {
                    let _ = tx.blocking_send(Err(e));
                }
            })
            .await;
            if let Err(e) = joined {
                error!(pool = %pool, error = %e, "Range producer failed");
                let _ = report
                    .send(Err(Error::Internal(format!("range producer failed: {}", e))))
                    .await;
            }
        });
    }

    /// Stop accepting work.
    pub fn close(&self) {
        let busy_ops = self.inner.max_ops - self.inner.ops.available_permits();
        let busy_scans = self.inner.max_scans - self.inner.scans.available_permits();
        self.inner.ops.close();
        self.inner.scans.close();
        if busy_ops + busy_scans > 0 {
            warn!(pool = %self.inner.name, busy_ops, busy_scans, "Closed storage pool with work in flight");
        } else {
            debug!(pool = %self.inner.name, "Closed storage pool");
        }
    }
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool")
            .field("name", &self.inner.name)
            .field("max_ops", &self.inner.max_ops)
            .field("max_scans", &self.inner.max_scans)
            .field("closed", &self.is_closed())
            .finish()
    }
}
