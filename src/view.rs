//! Presentation rules for task rows.
//!
//! Pure functions over [`Task`] fields: which colour a row gets, whether it
//! is stale, and the text shown in each column. Nothing here feeds back into
//! the board.

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};

use uuid::Uuid;

use crate::model::Task;

/// How often stale rows alternate between their tone and [`Tone::Blink`].
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// Default age after which an open task counts as stale.
pub const STALE_AFTER: SignedDuration = SignedDuration::from_hours(24);

pub const HEADERS: [&str; 7] = [
    "Id",
    "Description",
    "Assignee",
    "Priority",
    "Created",
    "Started",
    "Done",
];

/// Recognised priorities. Anything else displays as `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Colour class of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    High,
    Medium,
    Low,
    Done,
    Blink,
}

impl Tone {
    /// Background colour as a hex string.
    pub fn hex(self) -> &'static str {
        match self {
            Self::High => "#8b0000",
            Self::Medium => "#b38f00",
            Self::Low => "#006400",
            Self::Done => "#6e6e6e",
            Self::Blink => "#b30059",
        }
    }

    /// Background colour as RGB.
    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = &self.hex()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }
}

impl From<Priority> for Tone {
    fn from(p: Priority) -> Self {
        match p {
            Priority::High => Self::High,
            Priority::Medium => Self::Medium,
            Priority::Low => Self::Low,
        }
    }
}

/// An open task whose age has reached `threshold`.
pub fn is_stale(task: &Task, now: Timestamp, threshold: SignedDuration) -> bool {
    !task.completed && now.duration_since(task.created_at) >= threshold
}

/// The tone a row shows at `now` for the given blink phase.
pub fn row_tone(task: &Task, now: Timestamp, threshold: SignedDuration, blink_on: bool) -> Tone {
    if task.completed {
        Tone::Done
    } else if blink_on && is_stale(task, now, threshold) {
        Tone::Blink
    } else {
        Priority::parse(&task.priority).into()
    }
}

/// Blink phase at `now`: on for one [`BLINK_INTERVAL`], off for the next.
pub fn blink_phase(now: Timestamp) -> bool {
    let millis = now.as_millisecond();
    let period = i64::try_from(BLINK_INTERVAL.as_millis()).unwrap_or(i64::MAX);
    millis.div_euclid(period) % 2 == 0
}

/// Display strings for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub description: String,
    pub assignee: String,
    pub priority: String,
    pub created: String,
    pub started: String,
    pub done: String,
    pub tone: Tone,
    pub stale: bool,
}

impl TaskRow {
    pub fn from_task(task: &Task, now: Timestamp, threshold: SignedDuration, blink_on: bool) -> Self {
        Self {
            id: short_id(task.id),
            description: task.description.clone(),
            assignee: task.assignee.clone().unwrap_or_else(|| "-".into()),
            priority: task.priority.clone(),
            created: date(task.created_at),
            started: task.start_time.map_or_else(|| "-".into(), date),
            done: if task.completed { "✓".into() } else { String::new() },
            tone: row_tone(task, now, threshold, blink_on),
            stale: is_stale(task, now, threshold),
        }
    }

    pub fn cells(&self) -> [&str; 7] {
        [
            self.id.as_str(),
            self.description.as_str(),
            self.assignee.as_str(),
            self.priority.as_str(),
            self.created.as_str(),
            self.started.as_str(),
            self.done.as_str(),
        ]
    }
}

/// The first eight hex digits of an id, enough to toggle by prefix.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn date(ts: Timestamp) -> String {
    ts.strftime("%Y-%m-%d").to_string()
}
