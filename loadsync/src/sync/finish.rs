//! Finish state - the "fully finished" flag and the one-shot post hook

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Deferred action run once a loader has fully finished
pub type PostHook = Box<dyn FnOnce() + Send + 'static>;

/// What [`FinishState::attach_or_run`] did with the hook it was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAttach {
    /// Stored; it runs on the thread that performs the finishing step
    Stored,
    /// The task had already finished; the hook ran on the calling thread
    RanImmediately,
    /// A hook was stored earlier; this one was dropped without running
    Ignored,
}

#[derive(Default)]
struct Inner {
    finished: bool,
    /// Set once a hook is stored; never cleared, even after it ran
    stored: bool,
    hook: Option<PostHook>,
}

/// Guarded slot for the post hook, shared by attach and finish
///
/// Attach and finish take the same lock, so a finish can never slip in between
/// an attacher's "not finished yet" check and its store.
#[derive(Default)]
pub struct FinishState {
    inner: Mutex<Inner>,
}

impl FinishState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `hook`, or run it now if the task already finished
    ///
    /// Only one hook is ever stored: while or after a stored hook runs, later
    /// calls are no-ops. Without a stored hook, every hook attached after
    /// finish runs on the calling thread.
    pub fn attach_or_run(&self, hook: PostHook) -> HookAttach {
        let mut inner = self.lock();
        if inner.stored {
            debug!("FinishState::attach_or_run: hook already stored, ignoring");
            return HookAttach::Ignored;
        }
        if inner.finished {
            drop(inner);
            debug!("FinishState::attach_or_run: already finished, running hook");
            hook();
            return HookAttach::RanImmediately;
        }
        inner.stored = true;
        inner.hook = Some(hook);
        debug!("FinishState::attach_or_run: hook stored");
        HookAttach::Stored
    }

    /// Run the stored hook (if any), then mark the task finished
    ///
    /// With no stored hook, `finished` flips in the same critical section that
    /// found the slot empty. A stored hook runs outside the lock so it may call
    /// back into this state; the slot stays "stored" meanwhile, which turns any
    /// concurrent attach into a no-op, and `finished` only flips once it
    /// returns. Returns true if a hook ran.
    pub fn finish(&self) -> bool {
        let hook = {
            let mut inner = self.lock();
            if inner.finished {
                return false;
            }
            match inner.hook.take() {
                Some(hook) => hook,
                None => {
                    // A taken hook means another finish is running it
                    if !inner.stored {
                        inner.finished = true;
                    }
                    return false;
                }
            }
        };
        debug!("FinishState::finish: running stored hook");
        hook();
        self.lock().finished = true;
        true
    }

    /// True once `finish` has completed
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// True once a hook has been stored
    pub fn has_hook(&self) -> bool {
        self.lock().stored
    }
}

impl std::fmt::Debug for FinishState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FinishState")
            .field("finished", &inner.finished)
            .field("stored", &inner.stored)
            .field("hook_pending", &inner.hook.is_some())
            .finish()
    }
}
