//! Load outcomes and the report handed to the completion handler

use serde::{Deserialize, Serialize};

/// Terminal outcome of one loader run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum LoadOutcome {
    /// Both `do_before` and `do_loading` succeeded and nobody interrupted
    Success,
    /// `do_before` or `do_loading` failed
    Failed { message: String },
    /// Interruption was requested; `message` carries a loading failure, if any
    Interrupted { message: Option<String> },
}

impl LoadOutcome {
    /// Rebuild the outcome from the handler's `(error, interrupted)` pair
    pub fn from_parts(error: Option<String>, interrupted: bool) -> Self {
        match (error, interrupted) {
            (message, true) => Self::Interrupted { message },
            (Some(message), false) => Self::Failed { message },
            (None, false) => Self::Success,
        }
    }

    /// The error message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failed { message } => Some(message),
            Self::Interrupted { message } => message.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

impl std::fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed { message } => write!(f, "failed: {}", message),
            Self::Interrupted { message: None } => write!(f, "interrupted"),
            Self::Interrupted { message: Some(message) } => write!(f, "interrupted: {}", message),
        }
    }
}

/// Everything the completion handler receives
#[derive(Debug)]
pub struct FinishReport<T> {
    /// Failure message from `do_before` or `do_loading`
    pub error: Option<String>,
    /// Interruption flag read once after `do_loading` returned
    pub interrupted: bool,
    /// Items added since the last commit, in arrival order
    pub items: Vec<T>,
}

impl<T> FinishReport<T> {
    pub fn outcome(&self) -> LoadOutcome {
        LoadOutcome::from_parts(self.error.clone(), self.interrupted)
    }
}
