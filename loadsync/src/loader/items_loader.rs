//! ItemsLoader - runs a loader on the worker and finishes it on the affinity thread

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::handle::LoaderHandle;
use super::outcome::{FinishReport, LoadOutcome};
use super::traits::{LoadContext, Loader};
use crate::domain::TaskId;
use crate::events::{ChangeCode, ModelChanged};
use crate::library::Library;
use crate::sync::{CompletionLatch, HookAttach, LatchState};

/// Drives one run of a [`Loader`]
///
/// `run` consumes the coordinator, so a loader instance is run at most once.
/// Use [`handle`](Self::handle) before running to keep a way to interrupt it
/// or attach a post hook from other threads.
pub struct ItemsLoader<L: Loader> {
    loader: Arc<L>,
    handle: LoaderHandle,
    library: Library,
}

impl<L: Loader> ItemsLoader<L> {
    /// Create a coordinator for `loader` registered under `task_id`
    pub fn new(library: &Library, task_id: TaskId, loader: L) -> Self {
        Self::from_arc(library, task_id, Arc::new(loader))
    }

    /// Like [`new`](Self::new) for a loader the caller keeps a reference to
    pub fn from_arc(library: &Library, task_id: TaskId, loader: Arc<L>) -> Self {
        debug!(%task_id, "ItemsLoader::new: called");
        Self {
            loader,
            handle: LoaderHandle::new(task_id),
            library: library.clone(),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        self.handle.task_id()
    }

    /// Shared handle for interrupting, hooking, and lookup
    pub fn handle(&self) -> LoaderHandle {
        self.handle.clone()
    }

    pub fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    /// See [`LoaderHandle::set_post_runnable`]
    pub fn set_post_runnable<F>(&self, hook: F) -> HookAttach
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.set_post_runnable(hook)
    }

    /// Run the full lifecycle on the calling thread
    ///
    /// Returns only after `on_finish` has completed on the affinity thread and
    /// the loader has been unregistered, its post hook run, and the final
    /// change event broadcast. The finishing steps also run if `do_before` or
    /// `do_loading` panics; the panic then keeps unwinding.
    ///
    /// Blocks without timeout while the affinity thread is busy; if the
    /// dispatcher drops the completion job instead, `run` stops waiting.
    pub fn run(self) -> LoadOutcome {
        let Self {
            loader,
            handle,
            library,
        } = self;
        let task_id = handle.task_id().clone();
        info!(%task_id, "Loader starting");

        library.registry().store(task_id.clone(), handle.clone());
        let _finishing = Finishing {
            library: &library,
            handle: &handle,
        };
        library
            .notifier()
            .broadcast(ModelChanged::new(task_id.clone(), ChangeCode::Started));

        let ctx = LoadContext::new(handle.clone(), loader.clone(), library.dispatcher_arc());

        let (error, interrupted) = match loader.do_before(&ctx) {
            Err(e) => {
                warn!(%task_id, error = %e, "do_before failed, skipping do_loading");
                (Some(e.to_string()), false)
            }
            Ok(()) => {
                let error = match loader.do_loading(&ctx) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(%task_id, error = %e, "do_loading failed");
                        Some(e.to_string())
                    }
                };
                (error, handle.is_interrupted())
            }
        };

        let outcome = LoadOutcome::from_parts(error.clone(), interrupted);
        let latch = Arc::new(CompletionLatch::new());
        let job = FinishJob {
            task_id: task_id.clone(),
            loader,
            latch: latch.clone(),
            report: Some(FinishReport {
                error,
                interrupted,
                items: ctx.take_uncommitted(),
            }),
        };
        debug!(%task_id, %outcome, "ItemsLoader::run: dispatching completion handler");
        library.dispatcher().dispatch(Box::new(move || job.run()));

        match latch.wait() {
            LatchState::Processed => debug!(%task_id, "ItemsLoader::run: completion handler processed"),
            state => warn!(%task_id, ?state, "Completion handler did not run"),
        }
        outcome
    }
}

/// Completion handler bound for the affinity thread
///
/// Dropping it without running (dispatcher gone, or `on_finish` panicked)
/// abandons the latch so the worker is not left waiting forever.
struct FinishJob<L: Loader> {
    task_id: TaskId,
    loader: Arc<L>,
    latch: Arc<CompletionLatch>,
    report: Option<FinishReport<L::Item>>,
}

impl<L: Loader> FinishJob<L> {
    fn run(mut self) {
        if let Some(report) = self.report.take() {
            let loader = &self.loader;
            self.latch.run_and_signal(|| loader.on_finish(report));
        }
    }
}

impl<L: Loader> Drop for FinishJob<L> {
    fn drop(&mut self) {
        if self.latch.abandon() {
            warn!(task_id = %self.task_id, "Completion handler dropped before it could run");
        }
    }
}

/// Finishing sequence, run when `run` leaves its body by any path
struct Finishing<'a> {
    library: &'a Library,
    handle: &'a LoaderHandle,
}

impl Drop for Finishing<'_> {
    fn drop(&mut self) {
        let task_id = self.handle.task_id();
        if !self.library.registry().remove_if_same(task_id, self.handle) {
            debug!(%task_id, "Finishing: registry entry already gone");
        }
        let hook_ran = self.handle.finish();
        self.library
            .notifier()
            .broadcast(ModelChanged::new(task_id.clone(), ChangeCode::Finished));
        info!(%task_id, hook_ran, "Loader finished");
    }
}
