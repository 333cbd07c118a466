//! LoaderHandle - shared view of a running loader
//!
//! The handle is what the registry stores and what other threads hold: it can
//! request interruption, attach the post hook, and report whether the loader
//! has finished. It is cheap to clone and independent of the loader's item
//! type.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::domain::TaskId;
use crate::sync::{FinishState, HookAttach};

struct HandleInner {
    task_id: TaskId,
    interrupted: AtomicBool,
    finish: FinishState,
}

/// Cloneable handle to one loader instance
#[derive(Clone)]
pub struct LoaderHandle {
    inner: Arc<HandleInner>,
}

impl LoaderHandle {
    pub(crate) fn new(task_id: TaskId) -> Self {
        debug!(%task_id, "LoaderHandle::new: called");
        Self {
            inner: Arc::new(HandleInner {
                task_id,
                interrupted: AtomicBool::new(false),
                finish: FinishState::new(),
            }),
        }
    }

    /// Identity the loader is registered under
    pub fn task_id(&self) -> &TaskId {
        &self.inner.task_id
    }

    /// Ask the loader to stop
    ///
    /// Cooperative: `do_loading` sees it by polling
    /// [`LoadContext::is_interrupted`](super::LoadContext::is_interrupted), and
    /// the coordinator reads it once after `do_loading` returns. Returns true
    /// if this call made the request.
    pub fn interrupt(&self) -> bool {
        let first = !self.inner.interrupted.swap(true, Ordering::SeqCst);
        if first {
            info!(task_id = %self.inner.task_id, "Loader interrupt requested");
        }
        first
    }

    /// True once interruption has been requested
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Attach an action to run once the loader has fully finished
    ///
    /// - a hook was already stored: ignored
    /// - before finish: stored, later run on the worker thread
    /// - after finish: run right now on the calling thread
    pub fn set_post_runnable<F>(&self, hook: F) -> HookAttach
    where
        F: FnOnce() + Send + 'static,
    {
        let attach = self.inner.finish.attach_or_run(Box::new(hook));
        debug!(task_id = %self.inner.task_id, ?attach, "LoaderHandle::set_post_runnable");
        attach
    }

    /// True once the finishing sequence has marked the loader finished
    pub fn is_finished(&self) -> bool {
        self.inner.finish.is_finished()
    }

    /// True if both handles refer to the same loader instance
    pub fn same_loader(&self, other: &LoaderHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the stored hook and mark the loader finished
    pub(crate) fn finish(&self) -> bool {
        self.inner.finish.finish()
    }
}

impl std::fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHandle")
            .field("task_id", &self.inner.task_id)
            .field("interrupted", &self.is_interrupted())
            .field("finish", &self.inner.finish)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_interrupt_is_idempotent() {
        let handle = LoaderHandle::new(TaskId::from("t"));
        assert!(!handle.is_interrupted());
        assert!(handle.interrupt());
        assert!(!handle.interrupt());
        assert!(handle.is_interrupted());
    }

    #[test]
    fn test_clones_share_state() {
        let handle = LoaderHandle::new(TaskId::from("t"));
        let clone = handle.clone();
        clone.interrupt();
        assert!(handle.is_interrupted());
        assert!(handle.same_loader(&clone));
        assert!(!handle.same_loader(&LoaderHandle::new(TaskId::from("t"))));
    }

    #[test]
    fn test_post_runnable_through_handle() {
        let handle = LoaderHandle::new(TaskId::from("t"));
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        assert_eq!(
            handle.set_post_runnable(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            HookAttach::Stored
        );
        assert!(!handle.is_finished());
        assert!(handle.finish());
        assert!(handle.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
