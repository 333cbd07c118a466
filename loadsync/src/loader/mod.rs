//! Loader coordination
//!
//! A [`Loader`] does its work on a worker thread; [`ItemsLoader`] drives it:
//!
//! ```text
//!  worker thread                                 affinity thread
//!  ─────────────                                 ───────────────
//!  registry.store(id)
//!  notify(Started)
//!  do_before ──fail──┐
//!  do_loading        │
//!  dispatch(finish) ─┴──────────────────────────▶ on_finish(report)
//!  latch.wait() ◀──────────────────────────────── latch released
//!  registry.remove(id)
//!  post hook (if attached)
//!  finished = true
//!  notify(Finished)
//! ```
//!
//! A post hook attached after `finished` runs on the attaching thread.

mod handle;
mod items_loader;
mod outcome;
mod traits;

pub use handle::LoaderHandle;
pub use items_loader::ItemsLoader;
pub use outcome::{FinishReport, LoadOutcome};
pub use traits::{LoadContext, Loader};
