//! Draft types: tasks as the extractor proposes them.

use serde::{Deserialize, Serialize};

/// An unvalidated task proposal. Defaults are applied by
/// [`Task::from_draft`](super::Task::from_draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub description: String,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub assignee: Option<String>,
}

impl Draft {
    pub fn new(description: impl Into<String>, priority: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            priority: Some(priority.into()),
            assignee: None,
        }
    }
}
