//! Completion latch - "has the completion handler run yet"

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

/// State of a [`CompletionLatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// The handler has not run yet
    Pending,
    /// The handler ran to completion
    Processed,
    /// The handler can never run: its job was dropped unexecuted or panicked
    Abandoned,
}

/// One-shot latch released by the completion handler
///
/// `Pending` moves to `Processed` or `Abandoned` exactly once and never moves
/// back. Waiters loop on the condition, so spurious wake-ups are harmless, and
/// nothing short of release ends a wait.
#[derive(Debug)]
pub struct CompletionLatch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState::Pending),
            cond: Condvar::new(),
        }
    }

    // The guarded value is a plain enum that is only ever assigned whole, so a
    // panic while holding the lock cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, LatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `handler` while holding the latch, then release it as `Processed`
    ///
    /// Returns `None` without running `handler` if the latch was already
    /// released.
    pub fn run_and_signal<R>(&self, handler: impl FnOnce() -> R) -> Option<R> {
        let mut state = self.lock();
        if *state != LatchState::Pending {
            warn!(state = ?*state, "CompletionLatch::run_and_signal: latch already released");
            return None;
        }
        let out = handler();
        *state = LatchState::Processed;
        self.cond.notify_all();
        Some(out)
    }

    /// Release the latch as `Processed`
    ///
    /// Returns false if it was already released.
    pub fn signal(&self) -> bool {
        self.run_and_signal(|| ()).is_some()
    }

    /// Release the latch as `Abandoned` if nothing released it yet
    pub(crate) fn abandon(&self) -> bool {
        let mut state = self.lock();
        if *state != LatchState::Pending {
            return false;
        }
        *state = LatchState::Abandoned;
        self.cond.notify_all();
        true
    }

    /// Block until the latch is released and return how it was released
    ///
    /// There is no timeout: the caller depends on the affinity thread making
    /// progress.
    pub fn wait(&self) -> LatchState {
        debug!("CompletionLatch::wait: called");
        let mut state = self.lock();
        while *state == LatchState::Pending {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state
    }

    /// Current state without blocking
    pub fn state(&self) -> LatchState {
        *self.lock()
    }

    /// True once the handler has run
    pub fn is_processed(&self) -> bool {
        self.state() == LatchState::Processed
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}
