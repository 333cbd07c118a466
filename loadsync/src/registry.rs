//! Registry of running loaders keyed by task identity
//!
//! Other parts of the process use it to find an in-flight loader, for example
//! to interrupt it or to attach a post hook. A loader inserts its own entry
//! when `run` starts and removes it during the finishing sequence.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::domain::TaskId;
use crate::loader::LoaderHandle;

/// Process-wide map from task identity to running loader
///
/// `remove` is idempotent. Entries belong to the registry; a loader must not
/// assume nobody else removed or replaced its entry.
pub trait TaskRegistry: Send + Sync {
    /// Insert or replace the entry for `task_id`
    fn store(&self, task_id: TaskId, handle: LoaderHandle);

    /// Look up the loader running under `task_id`
    fn get(&self, task_id: &TaskId) -> Option<LoaderHandle>;

    /// Remove the entry for `task_id`, whatever loader it points at
    fn remove(&self, task_id: &TaskId) -> Option<LoaderHandle>;

    /// Remove the entry for `task_id` only if it still points at `handle`
    fn remove_if_same(&self, task_id: &TaskId, handle: &LoaderHandle) -> bool;

    /// IDs currently registered
    fn task_ids(&self) -> Vec<TaskId>;

    /// Number of registered loaders
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`TaskRegistry`] backed by a `RwLock<HashMap>`
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    loaders: RwLock<HashMap<TaskId, LoaderHandle>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

// Map updates are single calls; a panic elsewhere cannot leave the map half
// written, so a poisoned lock is still safe to use.
impl TaskRegistry for InMemoryRegistry {
    fn store(&self, task_id: TaskId, handle: LoaderHandle) {
        debug!(%task_id, "InMemoryRegistry::store: called");
        let mut loaders = self.loaders.write().unwrap_or_else(PoisonError::into_inner);
        if loaders.insert(task_id.clone(), handle).is_some() {
            debug!(%task_id, "InMemoryRegistry::store: replaced existing entry");
        }
    }

    fn get(&self, task_id: &TaskId) -> Option<LoaderHandle> {
        let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);
        loaders.get(task_id).cloned()
    }

    fn remove(&self, task_id: &TaskId) -> Option<LoaderHandle> {
        debug!(%task_id, "InMemoryRegistry::remove: called");
        let mut loaders = self.loaders.write().unwrap_or_else(PoisonError::into_inner);
        loaders.remove(task_id)
    }

    fn remove_if_same(&self, task_id: &TaskId, handle: &LoaderHandle) -> bool {
        let mut loaders = self.loaders.write().unwrap_or_else(PoisonError::into_inner);
        match loaders.get(task_id) {
            Some(current) if current.same_loader(handle) => {
                loaders.remove(task_id);
                true
            }
            Some(_) => {
                debug!(%task_id, "InMemoryRegistry::remove_if_same: entry belongs to another loader");
                false
            }
            None => false,
        }
    }

    fn task_ids(&self) -> Vec<TaskId> {
        let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<TaskId> = loaders.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.loaders.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_remove() {
        let registry = InMemoryRegistry::new();
        let id = TaskId::from("catalog");
        let handle = LoaderHandle::new(id.clone());

        assert!(registry.is_empty());
        registry.store(id.clone(), handle.clone());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).unwrap().same_loader(&handle));

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let id = TaskId::from("catalog");
        registry.store(id.clone(), LoaderHandle::new(id.clone()));
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_if_same_keeps_newer_loader() {
        let registry = InMemoryRegistry::new();
        let id = TaskId::from("catalog");
        let old = LoaderHandle::new(id.clone());
        let new = LoaderHandle::new(id.clone());

        registry.store(id.clone(), old.clone());
        registry.store(id.clone(), new.clone());

        assert!(!registry.remove_if_same(&id, &old));
        assert!(registry.get(&id).unwrap().same_loader(&new));
        assert!(registry.remove_if_same(&id, &new));
        assert!(!registry.remove_if_same(&id, &new));
    }

    #[test]
    fn test_task_ids_sorted() {
        let registry = InMemoryRegistry::new();
        for name in ["b", "c", "a"] {
            registry.store(TaskId::from(name), LoaderHandle::new(TaskId::from(name)));
        }
        let ids: Vec<String> = registry.task_ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
