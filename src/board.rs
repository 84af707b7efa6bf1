//! The shared task list.
//!
//! The watcher and the front end both work on one in-memory list. Every
//! read-modify-write happens under a single mutex, and the write to disk is
//! part of the same critical section. Mutations are applied to a copy which
//! replaces the live list only after the save succeeds, so a failed write
//! leaves memory matching what is on disk.
//!
//! A board opened with [`Board::following_disk`] shares its file with other
//! processes: every mutation and watcher pass starts from the file's current
//! contents instead of the in-memory copy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use tracing::{debug, info};
use uuid::Uuid;

use crate::extract::{ExtractionError, Extractor};
use crate::model::{Draft, Task};
use crate::store::{Store, StoreError};

/// Errors that can occur while changing the board.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("no task matching '{0}'")]
    TaskNotFound(String),

    #[error("'{0}' is ambiguous: matches {1} tasks")]
    AmbiguousTask(String, usize),

    #[error("row {} is out of range (board has {len} tasks)", .index + 1)]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = core::result::Result<T, BoardError>;

/// A cloneable handle on the shared task list and its store.
#[derive(Debug, Clone)]
pub struct Board {
    tasks: Arc<Mutex<Vec<Task>>>,
    store: Store,
    follow_disk: bool,
}

impl Board {
    /// Opens the board by loading everything currently in the store.
    ///
    /// A malformed task file is an error: there is nothing safe to fall back
    /// to apart from an empty list, which would be overwritten on first save.
    pub fn open(store: Store) -> Result<Self> {
        let tasks = store.load()?;
        debug!(count = tasks.len(), path = %store.path().display(), "opened board");
        Ok(Self {
            tasks: Arc::new(Mutex::new(tasks)),
            store,
            follow_disk: false,
        })
    }

    /// Makes every change re-read the file first, so writes from other
    /// processes are built on rather than overwritten.
    #[must_use]
    pub fn following_disk(mut self) -> Self {
        self.follow_disk = true;
        self
    }

    /// Replaces the in-memory list with the file's current contents.
    ///
    /// On error the in-memory list is left as it was.
    pub fn reload(&self) -> Result<()> {
        let mut guard = self.lock();
        *guard = self.store.load()?;
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A copy of the current list, in display order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Extracts drafts from `text` and appends them.
    ///
    /// The extractor runs before the lock is taken. Blank text and empty
    /// extractions leave the board and the file untouched.
    pub fn submit(&self, extractor: &dyn Extractor, text: &str) -> Result<Vec<Task>> {
        let drafts = extractor.extract(text)?;
        self.append(drafts)
    }

    /// Appends one task per draft and persists the full list.
    ///
    /// Returns the newly created tasks.
    pub fn append(&self, drafts: Vec<Draft>) -> Result<Vec<Task>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = Timestamp::now();
        let added: Vec<Task> = drafts
            .into_iter()
            .map(|d| Task::from_draft(d, now))
            .collect();

        self.commit(|tasks| {
            tasks.extend(added.iter().cloned());
            Ok(())
        })?;

        info!(count = added.len(), "appended tasks");
        Ok(added)
    }

    /// Flips `completed` on the task matching `reference`, a full id or an
    /// unambiguous id prefix. Returns the updated task.
    pub fn toggle(&self, reference: &str) -> Result<Task> {
        let updated = self.commit(|tasks| {
            let index = resolve(tasks, reference)?;
            Ok(flip(&mut tasks[index]))
        })?;
        info!(id = %updated.id, completed = updated.completed, "toggled task");
        Ok(updated)
    }

    /// Flips `completed` on the task at a zero-based row position.
    ///
    /// Errors report the row one-based, as it is displayed.
    pub fn toggle_at(&self, index: usize) -> Result<Task> {
        let updated = self.commit(|tasks| {
            let len = tasks.len();
            let task = tasks
                .get_mut(index)
                .ok_or(BoardError::IndexOutOfRange { index, len })?;
            Ok(flip(task))
        })?;
        info!(id = %updated.id, completed = updated.completed, "toggled task");
        Ok(updated)
    }

    /// Stamps `start_time = now` on every open, unstamped task.
    ///
    /// Saves only when something changed. Returns how many tasks were
    /// stamped.
    pub fn stamp_unstarted(&self, now: Timestamp) -> Result<usize> {
        let mut guard = self.lock();
        let mut next = self.base(&guard)?;
        if !next.iter().any(Task::awaiting_start) {
            *guard = next;
            return Ok(0);
        }

        let mut stamped = 0;
        for task in next.iter_mut().filter(|t| t.awaiting_start()) {
            task.start_time = Some(now);
            stamped += 1;
        }

        self.store.save(&next)?;
        *guard = next;
        Ok(stamped)
    }

    /// Runs `change` on a copy of the list, saves the copy, then swaps it in.
    fn commit<T>(&self, change: impl FnOnce(&mut Vec<Task>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut next = self.base(&guard)?;
        let out = change(&mut next)?;
        self.store.save(&next)?;
        *guard = next;
        Ok(out)
    }

    /// The list a change starts from: the file when following disk,
    /// otherwise the live list.
    fn base(&self, live: &[Task]) -> Result<Vec<Task>> {
        if self.follow_disk {
            Ok(self.store.load()?)
        } else {
            Ok(live.to_vec())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        // The live list is only ever replaced wholesale after a successful
        // save, so a panic elsewhere can't leave it half-modified.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn flip(task: &mut Task) -> Task {
    task.completed = !task.completed;
    task.clone()
}

/// Resolve a task reference (full UUID or unambiguous prefix) to a position.
fn resolve(tasks: &[Task], reference: &str) -> Result<usize> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| BoardError::TaskNotFound(reference.to_string()));
    }

    let reference = reference.trim().to_ascii_lowercase();
    if reference.is_empty() {
        return Err(BoardError::TaskNotFound(reference));
    }

    let matches: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.id.to_string().starts_with(&reference))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(BoardError::TaskNotFound(reference)),
        [index] => Ok(*index),
        many => Err(BoardError::AmbiguousTask(reference, many.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn test_board() -> (TempDir, Board) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("todos.json")).unwrap();
        let board = Board::open(store).unwrap();
        (dir, board)
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    /// Extractor stub returning canned drafts for any non-blank text.
    struct Canned(Vec<Draft>);

    impl Extractor for Canned {
        fn extract(&self, text: &str) -> core::result::Result<Vec<Draft>, ExtractionError> {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl Extractor for Failing {
        fn extract(&self, _text: &str) -> core::result::Result<Vec<Draft>, ExtractionError> {
            Err(ExtractionError::Malformed("not json".into()))
        }
    }

    #[test]
    fn open_missing_store_is_empty() {
        let (_dir, board) = test_board();
        assert!(board.is_empty());
    }

    #[test]
    fn open_malformed_store_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, "[{").unwrap();

        let err = Board::open(Store::new(path).unwrap()).unwrap_err();
        assert!(matches!(err, BoardError::Store(StoreError::Parse { .. })));
    }

    #[test]
    fn append_updates_memory_and_disk() {
        let (_dir, board) = test_board();

        let added = board
            .append(vec![Draft::new("A", "high"), Draft::new("B", "low")])
            .unwrap();

        assert_eq!(added.len(), 2);
        assert_eq!(board.snapshot(), added);
        assert_eq!(board.store().load().unwrap(), added);
    }

    #[test]
    fn append_nothing_does_not_write() {
        let (_dir, board) = test_board();

        board.append(Vec::new()).unwrap();

        assert!(!board.store().path().exists());
    }

    #[test]
    fn submit_blank_text_does_not_write() {
        let (_dir, board) = test_board();
        let extractor = Canned(vec![Draft::new("X", "low")]);

        let added = board.submit(&extractor, "  \n\t ").unwrap();

        assert!(added.is_empty());
        assert!(!board.store().path().exists());
    }

    #[test]
    fn submit_appends_extracted_drafts() {
        let (_dir, board) = test_board();
        let extractor = Canned(vec![Draft::new("Send storyboard", "high")]);

        board.submit(&extractor, "Mahmoud will send the storyboard").unwrap();

        let tasks = board.store().load().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Send storyboard");
    }

    #[test]
    fn failed_extraction_leaves_board_untouched() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("Existing", "low")]).unwrap();
        let before = board.snapshot();
        let on_disk = fs::read_to_string(board.store().path()).unwrap();

        let err = board.submit(&Failing, "some notes").unwrap_err();

        assert!(matches!(err, BoardError::Extraction(_)));
        assert_eq!(board.snapshot(), before);
        assert_eq!(fs::read_to_string(board.store().path()).unwrap(), on_disk);
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("store");
        let store = Store::new(store_dir.join("todos.json")).unwrap();
        let board = Board::open(store).unwrap();
        board.append(vec![Draft::new("Existing", "low")]).unwrap();
        let before = board.snapshot();

        // Temp files are created next to the document; without the
        // directory the save must fail.
        fs::remove_dir_all(&store_dir).unwrap();

        let err = board.append(vec![Draft::new("Lost", "high")]).unwrap_err();
        assert!(matches!(err, BoardError::Store(StoreError::Io(_))));
        assert_eq!(board.snapshot(), before);

        assert!(board.toggle_at(0).is_err());
        assert_eq!(board.snapshot(), before);
    }

    #[test]
    fn toggle_is_a_pure_flip() {
        let (_dir, board) = test_board();
        board
            .append(vec![Draft::new("A", "high"), Draft::new("B", "low")])
            .unwrap();
        board.stamp_unstarted(ts("2024-02-02T00:00:00Z")).unwrap();
        let before = board.snapshot();
        let disk_before = board.store().load().unwrap();

        let updated = board.toggle(&before[1].id.to_string()).unwrap();

        let after = board.snapshot();
        assert!(updated.completed);
        assert_eq!(after[0], before[0]);
        let mut expected = before[1].clone();
        expected.completed = true;
        assert_eq!(after[1], expected);

        let disk_after = board.store().load().unwrap();
        assert_eq!(disk_after[0], disk_before[0]);
        assert_eq!(disk_after[1], expected);

        // And back again.
        board.toggle(&before[1].id.to_string()).unwrap();
        assert_eq!(board.snapshot(), before);
    }

    #[test]
    fn toggle_by_prefix() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();
        let id = board.snapshot()[0].id.to_string();

        let updated = board.toggle(&id[..8]).unwrap();
        assert!(updated.completed);
    }

    #[test]
    fn toggle_unknown_reference_fails() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();

        let err = board.toggle("zzzz").unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound(_)));

        let err = board.toggle(&Uuid::new_v4().to_string()).unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound(_)));

        let err = board.toggle("").unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound(_)));
    }

    #[test]
    fn toggle_ambiguous_prefix_fails() {
        let (_dir, board) = test_board();
        let created = ts("2024-01-01T00:00:00Z");
        let mut a = Task::new("A", "low", created);
        a.id = "aaaaaaaa-0000-4000-8000-000000000001".parse().unwrap();
        let mut b = Task::new("B", "low", created);
        b.id = "aaaaaaaa-0000-4000-8000-000000000002".parse().unwrap();
        board.store().save(&[a, b]).unwrap();
        let board = Board::open(board.store().clone()).unwrap();

        let err = board.toggle("aaaa").unwrap_err();
        assert!(matches!(err, BoardError::AmbiguousTask(_, 2)));
    }

    #[test]
    fn toggle_at_out_of_range_fails() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();

        let err = board.toggle_at(1).unwrap_err();
        assert!(matches!(
            err,
            BoardError::IndexOutOfRange { index: 1, len: 1 }
        ));
    }

    #[test]
    fn stamp_sets_start_time_once() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();

        let first = ts("2024-03-01T00:00:00Z");
        assert_eq!(board.stamp_unstarted(first).unwrap(), 1);
        assert_eq!(board.snapshot()[0].start_time, Some(first));

        let second = ts("2024-03-01T01:00:00Z");
        assert_eq!(board.stamp_unstarted(second).unwrap(), 0);
        assert_eq!(board.snapshot()[0].start_time, Some(first));
        assert_eq!(board.store().load().unwrap()[0].start_time, Some(first));
    }

    #[test]
    fn stamp_skips_completed_tasks() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();
        board.toggle_at(0).unwrap();

        for hour in 0..3 {
            let now = ts("2024-03-01T00:00:00Z")
                .checked_add(jiff::SignedDuration::from_hours(hour))
                .unwrap();
            assert_eq!(board.stamp_unstarted(now).unwrap(), 0);
        }
        assert!(board.snapshot()[0].start_time.is_none());
    }

    #[test]
    fn stamp_without_changes_does_not_write() {
        let (_dir, board) = test_board();

        assert_eq!(board.stamp_unstarted(Timestamp::now()).unwrap(), 0);
        assert!(!board.store().path().exists());
    }

    /// Two boards on one file, as `watch` and `add` run in separate processes.
    fn shared_boards() -> (TempDir, Board, Board) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        let watching = Board::open(Store::new(&path).unwrap())
            .unwrap()
            .following_disk();
        let adding = Board::open(Store::new(&path).unwrap())
            .unwrap()
            .following_disk();
        (dir, watching, adding)
    }

    #[test]
    fn stamp_picks_up_tasks_added_by_another_board() {
        let (_dir, watching, adding) = shared_boards();
        assert_eq!(watching.stamp_unstarted(Timestamp::now()).unwrap(), 0);

        adding.append(vec![Draft::new("Book render farm", "high")]).unwrap();

        assert_eq!(watching.stamp_unstarted(Timestamp::now()).unwrap(), 1);
        let on_disk = watching.store().load().unwrap();
        assert_eq!(on_disk.len(), 1);
        assert!(on_disk[0].start_time.is_some());
        assert_eq!(watching.snapshot(), on_disk);
    }

    #[test]
    fn stamp_does_not_overwrite_tasks_added_by_another_board() {
        let (_dir, watching, adding) = shared_boards();
        adding.append(vec![Draft::new("Existing", "low")]).unwrap();
        watching.reload().unwrap();
        assert_eq!(watching.len(), 1);

        adding.append(vec![Draft::new("New", "medium")]).unwrap();
        assert_eq!(watching.stamp_unstarted(Timestamp::now()).unwrap(), 2);

        let on_disk = watching.store().load().unwrap();
        let descriptions: Vec<&str> = on_disk.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, ["Existing", "New"]);
        assert!(on_disk.iter().all(|t| t.start_time.is_some()));
    }

    #[test]
    fn append_and_toggle_build_on_the_file() {
        let (_dir, first, second) = shared_boards();
        first.append(vec![Draft::new("A", "high")]).unwrap();
        second.append(vec![Draft::new("B", "low")]).unwrap();
        first.append(vec![Draft::new("C", "low")]).unwrap();

        let id = second.store().load().unwrap()[2].id.to_string();
        let updated = second.toggle(&id[..8]).unwrap();
        assert_eq!(updated.description, "C");

        let on_disk = first.store().load().unwrap();
        let descriptions: Vec<&str> = on_disk.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, ["A", "B", "C"]);
        assert!(on_disk[2].completed);
    }

    #[test]
    fn reload_keeps_memory_on_malformed_file() {
        let (_dir, board) = test_board();
        board.append(vec![Draft::new("A", "high")]).unwrap();
        let before = board.snapshot();

        fs::write(board.store().path(), "garbage").unwrap();

        assert!(matches!(
            board.reload(),
            Err(BoardError::Store(StoreError::Parse { .. }))
        ));
        assert_eq!(board.snapshot(), before);
    }
}
