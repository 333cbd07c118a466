//! Task identity
//!
//! Generated IDs use the format: `{6-char-hex}-{kind}-{slug}`
//! Example: `019430-catalog-new-releases`

use serde::{Deserialize, Serialize};

/// Generate a task ID string from a kind and a title
pub fn generate_id(kind: &str, title: &str) -> String {
    // The leading bits of a v7 uuid are a millisecond timestamp; the tail is random.
    let hex = uuid::Uuid::now_v7().simple().to_string();
    let hex_prefix = &hex[hex.len() - 6..];
    let slug = slugify(title);
    format!("{}-{}-{}", hex_prefix, kind, slug)
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Key under which a running loader is registered
///
/// Opaque to the coordinator: it is only compared and hashed. Any string is a
/// valid identity; [`TaskId::generate`] produces readable unique ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a fresh, unique ID from a kind and a title
    pub fn generate(kind: &str, title: &str) -> Self {
        Self(generate_id(kind, title))
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the kind portion of a generated ID
    pub fn kind(&self) -> Option<&str> {
        let parts: Vec<&str> = self.0.splitn(3, '-').collect();
        parts.get(1).copied()
    }

    /// Get the slug portion of a generated ID
    pub fn slug(&self) -> Option<&str> {
        let parts: Vec<&str> = self.0.splitn(3, '-').collect();
        parts.get(2).copied()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
