//! Loader trait and the context it works through

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::handle::LoaderHandle;
use super::outcome::FinishReport;
use crate::affinity::AffinityDispatcher;
use crate::domain::TaskId;
use crate::error::LoadError;

/// A concrete load operation driven by [`ItemsLoader`](super::ItemsLoader)
///
/// `do_before` and `do_loading` run on the worker thread; `on_commit` and
/// `on_finish` run on the affinity thread. Errors are only ever seen as their
/// message by `on_finish`.
pub trait Loader: Send + Sync + Sized + 'static {
    /// Item produced by the load
    type Item: Send + 'static;

    /// Pre-work setup; a failure skips `do_loading` entirely
    fn do_before(&self, _ctx: &LoadContext<Self>) -> Result<(), LoadError> {
        Ok(())
    }

    /// The main work; should poll `ctx.is_interrupted()` and return early
    fn do_loading(&self, ctx: &LoadContext<Self>) -> Result<(), LoadError>;

    /// Receive a batch handed over by `ctx.commit_items()`
    fn on_commit(&self, _items: Vec<Self::Item>) {}

    /// Completion handler, run exactly once per `run`
    fn on_finish(&self, report: FinishReport<Self::Item>);
}

/// Worker-side view of a running loader
pub struct LoadContext<L: Loader> {
    handle: LoaderHandle,
    loader: Arc<L>,
    dispatcher: Arc<dyn AffinityDispatcher>,
    items: Mutex<Vec<L::Item>>,
    committed: AtomicUsize,
}

impl<L: Loader> LoadContext<L> {
    pub(crate) fn new(handle: LoaderHandle, loader: Arc<L>, dispatcher: Arc<dyn AffinityDispatcher>) -> Self {
        Self {
            handle,
            loader,
            dispatcher,
            items: Mutex::new(Vec::new()),
            committed: AtomicUsize::new(0),
        }
    }

    // Every update is a single push or take, so a poisoned lock still guards a
    // whole Vec.
    fn items(&self) -> std::sync::MutexGuard<'_, Vec<L::Item>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn task_id(&self) -> &TaskId {
        self.handle.task_id()
    }

    /// True once somebody asked this loader to stop
    pub fn is_interrupted(&self) -> bool {
        self.handle.is_interrupted()
    }

    /// Record a newly produced item as uncommitted
    pub fn add_item(&self, item: L::Item) {
        self.items().push(item);
    }

    /// Number of items not yet committed
    pub fn uncommitted_len(&self) -> usize {
        self.items().len()
    }

    /// Total number of items handed over through `commit_items`
    pub fn committed_len(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }

    /// Hand the uncommitted items to `on_commit` on the affinity thread
    ///
    /// Does not wait for the handler. Batches reach `on_commit` in commit
    /// order and always before `on_finish`. Returns the batch size.
    pub fn commit_items(&self) -> usize {
        let batch = std::mem::take(&mut *self.items());
        let count = batch.len();
        if count == 0 {
            return 0;
        }
        debug!(task_id = %self.task_id(), count, "LoadContext::commit_items: dispatching batch");
        self.committed.fetch_add(count, Ordering::SeqCst);
        let loader = self.loader.clone();
        self.dispatcher.dispatch(Box::new(move || loader.on_commit(batch)));
        count
    }

    /// Remove and return everything still uncommitted
    pub(crate) fn take_uncommitted(&self) -> Vec<L::Item> {
        std::mem::take(&mut *self.items())
    }
}
