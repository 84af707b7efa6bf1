//! Local persistence for the task list.
//!
//! The whole list lives in one pretty-printed JSON array:
//!
//! ```text
//! ~/.todo-ai/todos.json
//! ```
//!
//! Every save rewrites the full document. The new contents go to a temp file
//! in the same directory which is then renamed over the old one, so readers
//! never see a half-written list. A missing file is a valid empty list.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::model::{Draft, Task};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task file {} is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// File-backed storage for the task list.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Creates a store backed by the given file.
    ///
    /// The parent directory is created if it doesn't exist. The file itself
    /// is only written on the first save.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Returns the default task file: `~/.todo-ai/todos.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".todo-ai").join("todos.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every task, in stored order.
    ///
    /// Returns an empty list if the file doesn't exist.
    pub fn load(&self) -> Result<Vec<Task>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&json).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the stored list with `tasks`.
    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        let mut json = serde_json::to_string_pretty(tasks)?;
        json.push('\n');

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }

    /// Appends one task per draft to the stored list and returns the new
    /// full list.
    pub fn append(&self, drafts: Vec<Draft>) -> Result<Vec<Task>> {
        let mut tasks = self.load()?;
        let now = Timestamp::now();
        tasks.extend(drafts.into_iter().map(|d| Task::from_draft(d, now)));
        self.save(&tasks)?;
        Ok(tasks)
    }
}
