//! Upgradeable read/write lock
//!
//! A shared/exclusive lock whose read guards can try to convert in place to
//! exclusive mode. The conversion never blocks: it succeeds only when the
//! caller is the sole reader and no writer holds the lock.
//!
//! Writers are preferred: once a writer is waiting, new readers queue behind
//! it. An upgrade still succeeds past a waiting writer, since the upgrading
//! reader already holds the lock.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

/// Shared/exclusive lock with non-blocking upgrade.
#[derive(Debug, Default)]
pub struct StampedLock {
    state: Mutex<LockState>,
    readers_cv: Condvar,
    writers_cv: Condvar,
}

/// Mode currently held by a [`StampGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampMode {
    /// Shared
    Read,
    /// Exclusive
    Write,
}

impl StampedLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared access, blocking while a writer holds or awaits the lock.
    pub fn read(&self) -> StampGuard<'_> {
        let mut state = self.state.lock();
        while state.writer || state.waiting_writers > 0 {
            self.readers_cv.wait(&mut state);
        }
        state.readers += 1;
        StampGuard {
            lock: self,
            mode: StampMode::Read,
        }
    }

    /// Acquire exclusive access.
    pub fn write(&self) -> StampGuard<'_> {
        self.acquire_write();
        StampGuard {
            lock: self,
            mode: StampMode::Write,
        }
    }

    /// Acquire shared access without blocking.
    pub fn try_read(&self) -> Option<StampGuard<'_>> {
        let mut state = self.state.lock();
        if state.writer || state.waiting_writers > 0 {
            return None;
        }
        state.readers += 1;
        Some(StampGuard {
            lock: self,
            mode: StampMode::Read,
        })
    }

    /// Number of current readers
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Whether a writer holds the lock
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer
    }

    fn acquire_write(&self) {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            self.writers_cv.wait(&mut state);
        }
        state.waiting_writers -= 1;
        state.writer = true;
    }

    fn try_convert_to_write(&self) -> bool {
        let mut state = self.state.lock();
        if state.readers == 1 && !state.writer {
            state.readers = 0;
            state.writer = true;
            true
        } else {
            false
        }
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 && state.waiting_writers > 0 {
            self.writers_cv.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        if state.waiting_writers > 0 {
            self.writers_cv.notify_one();
        } else {
            self.readers_cv.notify_all();
        }
    }
}

/// Held access to a [`StampedLock`]. Released on drop.
#[derive(Debug)]
pub struct StampGuard<'a> {
    lock: &'a StampedLock,
    mode: StampMode,
}

impl<'a> StampGuard<'a> {
    /// Mode currently held
    pub fn mode(&self) -> StampMode {
        self.mode
    }

    /// True when held exclusively
    pub fn is_write(&self) -> bool {
        self.mode == StampMode::Write
    }

    /// Convert a shared hold to exclusive in place, without blocking.
    ///
    /// Returns `true` if the guard is now exclusive. On `false` the guard
    /// still holds shared access. Already-exclusive guards return `true`.
    pub fn try_upgrade(&mut self) -> bool {
        match self.mode {
            StampMode::Write => true,
            StampMode::Read => {
                if self.lock.try_convert_to_write() {
                    self.mode = StampMode::Write;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Give up shared access and block for exclusive access.
    ///
    /// Anything read under the shared hold may be stale afterwards.
    pub fn reacquire_write(self) -> StampGuard<'a> {
        let lock = self.lock;
        if self.is_write() {
            return self;
        }
        drop(self);
        lock.write()
    }
}

impl Drop for StampGuard<'_> {
    fn drop(&mut self) {
        match self.mode {
            StampMode::Read => self.lock.release_read(),
            StampMode::Write => self.lock.release_write(),
        }
    }
}
