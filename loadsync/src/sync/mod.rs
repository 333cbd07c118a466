//! Per-task synchronization primitives
//!
//! - [`CompletionLatch`]: the worker blocks on it until the completion handler
//!   has actually run on the affinity thread.
//! - [`FinishState`]: the "fully finished" flag plus the one-shot post hook.
//!
//! Both are private to one loader instance and never shared across tasks.

mod finish;
mod latch;

pub use finish::{FinishState, HookAttach, PostHook};
pub use latch::{CompletionLatch, LatchState};
