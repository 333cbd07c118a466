//! Error types for loadsync

use thiserror::Error;

/// Failure raised by a loader's `do_before` or `do_loading`.
///
/// Only the rendered message is handed to the completion handler; the error
/// value itself never leaves the worker thread.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Free-form failure reported by the loader
    #[error("{0}")]
    Message(String),

    /// IO failure while fetching or reading data
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Data arrived but could not be understood
    #[error("parse error: {0}")]
    Parse(String),
}

impl LoadError {
    /// Shorthand for [`LoadError::Message`]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Errors from the in-process collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// The affinity loop is no longer accepting jobs
    #[error("affinity loop is shut down")]
    AffinityClosed,

    /// A job running on the affinity thread panicked and took the thread down
    #[error("affinity thread panicked")]
    AffinityPanicked,

    /// Spawning a named thread failed
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for collaborator operations
pub type Result<T> = std::result::Result<T, Error>;
