//! Task types: the persisted unit of work.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Draft;

/// Priority stored on tasks built from drafts that carry none.
pub const DEFAULT_PRIORITY: &str = "medium";

/// One row of the to-do list.
///
/// `created_at` never changes after construction and `start_time` moves
/// from `None` to `Some` at most once. `completed` toggles freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier. Documents written before ids existed get a fresh
    /// one on load, persisted on the next save.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub description: String,

    /// Kept verbatim. Display logic treats anything other than
    /// `high`/`medium`/`low` as `low`.
    #[serde(default = "default_priority")]
    pub priority: String,

    #[serde(default)]
    pub assignee: Option<String>,

    pub created_at: Timestamp,

    /// When the watcher first saw this task while it was still open.
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Creates an open, unstamped task.
    pub fn new(description: impl Into<String>, priority: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            priority: priority.into(),
            assignee: None,
            created_at: now,
            start_time: None,
            completed: false,
        }
    }

    /// Builds a task from an extractor draft.
    ///
    /// A draft without a priority (or with a blank one) becomes `medium`.
    pub fn from_draft(draft: Draft, now: Timestamp) -> Self {
        let priority = draft
            .priority
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(default_priority);

        Self {
            assignee: draft.assignee.filter(|a| !a.trim().is_empty()),
            ..Self::new(draft.description, priority, now)
        }
    }

    /// Whether the watcher should stamp this task.
    pub fn awaiting_start(&self) -> bool {
        !self.completed && self.start_time.is_none()
    }
}

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}
