//! Read-modify-write
//!
//! One primitive computes a [`Delta`]; `update` projects it.
//!
//! ```text
//! 1. read-lock the key's stripe
//! 2. read the current value
//! 3. run the updater
//! 4. NoOp   -> release, return
//!    Write/Delete -> try to upgrade the stripe in place
//!      ok   -> apply under the exclusive hold, return
//!      fail -> release, block for the write lock, go to 2
//! ```
//!
//! The restart happens while holding the write lock, so its upgrade cannot
//! fail again: every call restarts at most once. The updater may therefore
//! run twice and must be free of side effects it cannot repeat.

use crate::dictionary::{Dictionary, DictionaryInner};
use keyspan_concurrency::StripedLocks;
use keyspan_core::{
    Delta, Error, Key, KeyDisplay, Result, UpdateAction, UpdateMode, UpdateReturnMode, Value,
};
use keyspan_storage::ReadView;
use std::sync::Arc;
use tracing::trace;

impl DictionaryInner {
    fn update_stripes(&self) -> Result<&StripedLocks> {
        match (self.update_mode, &self.stripes) {
            (UpdateMode::Allow, Some(stripes)) => Ok(stripes),
            _ => Err(Error::Unsupported(format!(
                "update on dictionary {} with update mode {:?}",
                self.name, self.update_mode
            ))),
        }
    }

    pub(crate) fn update_blocking<F>(
        &self,
        key: &[u8],
        mut updater: F,
        exists_almost_certainly: bool,
    ) -> Result<Delta<Value>>
    where
        F: FnMut(Option<&[u8]>) -> Option<Value>,
    {
        let mut guard = self.update_stripes()?.read(key);
        loop {
            let previous = self.get_unlocked(ReadView::Latest, key, exists_almost_certainly)?;
            let current = updater(previous.as_deref());
            let action = UpdateAction::decide(previous.as_deref(), current.as_deref());
            if action == UpdateAction::NoOp {
                return Ok(Delta::new(previous, current));
            }

            if !guard.try_upgrade() {
                trace!(dictionary = %self.name, key = %KeyDisplay(key), "Upgrade failed, restarting under write lock");
                guard = guard.reacquire_write();
                continue;
            }

            match (action, current.as_deref()) {
                (UpdateAction::Write, Some(value)) => self.write_unlocked(key, value)?,
                (UpdateAction::Delete, _) => self.delete_unlocked(key)?,
                _ => {}
            }
            return Ok(Delta::new(previous, current));
        }
    }
}

impl Dictionary {
    /// Atomically replace a key's value with `updater(current)`.
    ///
    /// `None` from the updater deletes the key. Returns the old value, the new
    /// value, or nothing according to `return_mode`.
    ///
    /// Fails with `Unsupported` on dictionaries opened with
    /// [`UpdateMode::Disallow`].
    pub async fn update<F>(
        &self,
        key: impl Into<Key>,
        updater: F,
        return_mode: UpdateReturnMode,
        exists_almost_certainly: bool,
    ) -> Result<Option<Value>>
    where
        F: FnMut(Option<&[u8]>) -> Option<Value> + Send + 'static,
    {
        let delta = self
            .update_and_get_delta(key, updater, exists_almost_certainly)
            .await?;
        Ok(delta.project(return_mode))
    }

    /// Like [`update`](Self::update), returning both sides of the change.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let delta = dict
    ///     .update_and_get_delta(key, |old| old.map(|v| [v, b"!"].concat()), false)
    ///     .await?;
    /// assert!(delta.is_modified());
    /// ```
    pub async fn update_and_get_delta<F>(
        &self,
        key: impl Into<Key>,
        updater: F,
        exists_almost_certainly: bool,
    ) -> Result<Delta<Value>>
    where
        F: FnMut(Option<&[u8]>) -> Option<Value> + Send + 'static,
    {
        self.inner.update_stripes()?;
        let key = key.into();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .run(move || inner.update_blocking(&key, updater, exists_almost_certainly))
            .await
    }
}
