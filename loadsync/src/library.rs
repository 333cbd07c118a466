//! Library - the environment loaders run in
//!
//! Bundles the three collaborators every loader talks to: the registry of
//! running loaders, the change notifier, and the affinity dispatcher.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::affinity::AffinityDispatcher;
use crate::domain::TaskId;
use crate::error::{Error, Result};
use crate::events::ChangeNotifier;
use crate::loader::{ItemsLoader, LoadOutcome, Loader, LoaderHandle};
use crate::registry::{InMemoryRegistry, TaskRegistry};

/// Shared collaborators for loaders; cheap to clone
#[derive(Clone)]
pub struct Library {
    registry: Arc<dyn TaskRegistry>,
    notifier: Arc<dyn ChangeNotifier>,
    dispatcher: Arc<dyn AffinityDispatcher>,
}

impl Library {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        notifier: Arc<dyn ChangeNotifier>,
        dispatcher: Arc<dyn AffinityDispatcher>,
    ) -> Self {
        Self {
            registry,
            notifier,
            dispatcher,
        }
    }

    /// Library with a fresh [`InMemoryRegistry`]
    pub fn in_memory(notifier: Arc<dyn ChangeNotifier>, dispatcher: Arc<dyn AffinityDispatcher>) -> Self {
        Self::new(Arc::new(InMemoryRegistry::new()), notifier, dispatcher)
    }

    pub fn registry(&self) -> &dyn TaskRegistry {
        self.registry.as_ref()
    }

    pub fn notifier(&self) -> &dyn ChangeNotifier {
        self.notifier.as_ref()
    }

    pub fn dispatcher(&self) -> &dyn AffinityDispatcher {
        self.dispatcher.as_ref()
    }

    pub(crate) fn dispatcher_arc(&self) -> Arc<dyn AffinityDispatcher> {
        self.dispatcher.clone()
    }

    /// Find the loader currently running under `task_id`
    pub fn running(&self, task_id: &TaskId) -> Option<LoaderHandle> {
        self.registry.get(task_id)
    }

    /// Request interruption of the loader running under `task_id`
    ///
    /// Returns false if no such loader is running or it was already asked.
    pub fn interrupt(&self, task_id: &TaskId) -> bool {
        debug!(%task_id, "Library::interrupt: called");
        self.running(task_id).is_some_and(|handle| handle.interrupt())
    }

    /// Create a coordinator for `loader` in this library
    pub fn loader<L: Loader>(&self, task_id: TaskId, loader: L) -> ItemsLoader<L> {
        ItemsLoader::new(self, task_id, loader)
    }

    /// Run `loader` on a new worker thread
    ///
    /// The handle is returned before the worker starts, so a post hook
    /// attached through it may land before or after the loader finishes.
    pub fn spawn<L: Loader>(&self, task_id: TaskId, loader: L) -> Result<(LoaderHandle, JoinHandle<LoadOutcome>)> {
        let items_loader = self.loader(task_id, loader);
        let handle = items_loader.handle();
        let name = format!("loadsync-worker-{}", handle.task_id());
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || items_loader.run())
            .map_err(|source| Error::Spawn { name, source })?;
        Ok((handle, join))
    }
}
