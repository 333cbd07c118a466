//! Event types for loader lifecycle notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// What happened to the model behind a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeCode {
    /// A loader registered itself and is about to start work
    Started,
    /// A loader finished its bookkeeping and left the registry
    Finished,
}

impl std::fmt::Display for ChangeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// "Model changed" notification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelChanged {
    pub task_id: TaskId,
    pub code: ChangeCode,
    pub timestamp: DateTime<Utc>,
}

impl ModelChanged {
    /// Create an event stamped with the current time
    pub fn new(task_id: TaskId, code: ChangeCode) -> Self {
        Self {
            task_id,
            code,
            timestamp: Utc::now(),
        }
    }
}
