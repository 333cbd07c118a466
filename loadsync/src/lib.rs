//! loadsync - worker-to-affinity-thread completion coordinator
//!
//! A loader does its work on a background worker thread, but its completion
//! handler must run on one designated affinity thread (think UI thread), and
//! the worker may not wrap up until that handler has actually run.
//!
//! # Core Concepts
//!
//! - **Finish on the affinity thread**: `on_finish` runs on the affinity
//!   thread, and `ItemsLoader::run` returns only after it completed
//! - **Guaranteed finishing**: unregister, post hook, and the final change
//!   event run on every outcome
//! - **Post hooks either side of finish**: a hook attached before finish runs
//!   on the worker, one attached after runs immediately on the caller
//! - **Cooperative interruption**: loaders poll a flag; nothing is preempted
//!
//! # Modules
//!
//! - [`loader`] - `Loader` trait, `ItemsLoader` coordinator, `LoaderHandle`
//! - [`sync`] - completion latch and finish state
//! - [`affinity`] - affinity dispatcher trait and the `AffinityLoop` thread
//! - [`registry`] - running-loader registry
//! - [`events`] - model-change notifications
//! - [`library`] - bundle of the collaborators a loader runs against
//! - [`demo`] - simulated loaders for the CLI
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod affinity;
pub mod cli;
pub mod config;
pub mod demo;
pub mod domain;
pub mod error;
pub mod events;
pub mod library;
pub mod loader;
pub mod registry;
pub mod sync;

// Re-export commonly used types
pub use affinity::{AffinityDispatcher, AffinityJob, AffinityLoop, AffinitySender};
pub use config::Config;
pub use domain::TaskId;
pub use error::{Error, LoadError};
pub use events::{ChangeCode, ChangeNotifier, EventBus, ModelChanged};
pub use library::Library;
pub use loader::{FinishReport, ItemsLoader, LoadContext, LoadOutcome, Loader, LoaderHandle};
pub use registry::{InMemoryRegistry, TaskRegistry};
pub use sync::{CompletionLatch, FinishState, HookAttach, LatchState};
