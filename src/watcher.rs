//! Background watcher: stamps a start time on tasks it sees open.
//!
//! One pass runs immediately on start and then once per interval. A pass
//! takes a single timestamp and stamps it on every open task that has no
//! `start_time` yet, saving only if something changed. Tasks appended while a
//! pass holds the board lock are picked up by the next pass.
//!
//! A failing pass is logged and counted; the loop always carries on to the
//! next interval.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use jiff::Timestamp;
use tracing::{debug, error, info, warn};

use crate::board::{Board, BoardError};

/// Consecutive failures after which each further failure logs at `error`.
const ESCALATE_AFTER: u64 = 3;

/// Errors that can end a single watcher pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("watcher pass panicked: {0}")]
    Panicked(String),
}

/// Periodic start-time stamper over a shared board.
#[derive(Debug, Clone)]
pub struct Watcher {
    board: Board,
    interval: Duration,
}

impl Watcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);
    pub const DEBUG_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(board: Board, interval: Duration) -> Self {
        Self { board, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one pass now, on the calling thread. Returns how many tasks were
    /// stamped.
    pub fn run_pass(&self) -> Result<usize, PassError> {
        let now = Timestamp::now();
        let board = &self.board;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| board.stamp_unstarted(now)));
        match outcome {
            Ok(result) => Ok(result?),
            Err(payload) => Err(PassError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Starts the watcher on its own thread.
    pub fn spawn(self) -> std::io::Result<WatcherHandle> {
        let (shutdown, signal) = mpsc::channel::<()>();
        let stats = Arc::new(Stats::default());
        let thread_stats = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name("task-watcher".into())
            .spawn(move || {
                info!(interval = ?self.interval, "watcher started");
                loop {
                    self.pass_and_record(&thread_stats);

                    match signal.recv_timeout(self.interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("watcher stopped");
            })?;

        Ok(WatcherHandle {
            shutdown: Some(shutdown),
            thread: Some(thread),
            stats,
        })
    }

    fn pass_and_record(&self, stats: &Stats) {
        match self.run_pass() {
            Ok(stamped) => {
                stats.consecutive.store(0, Ordering::Relaxed);
                if stamped > 0 {
                    info!(stamped, "stamped start time on open tasks");
                } else {
                    debug!("watcher pass found nothing to stamp");
                }
            }
            Err(e) => {
                let consecutive = stats.consecutive.fetch_add(1, Ordering::Relaxed) + 1;
                stats.total.fetch_add(1, Ordering::Relaxed);
                if consecutive > ESCALATE_AFTER {
                    error!(error = %e, consecutive, "watcher keeps failing; retrying next interval");
                } else {
                    warn!(error = %e, consecutive, "watcher pass failed; retrying next interval");
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    consecutive: AtomicU64,
    total: AtomicU64,
}

/// Owner of a running watcher thread.
///
/// Dropping the handle stops the watcher the same way
/// [`shutdown`](Self::shutdown) does.
#[derive(Debug)]
pub struct WatcherHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<Stats>,
}

impl WatcherHandle {
    /// Failed passes since the last successful one.
    pub fn consecutive_failures(&self) -> u64 {
        self.stats.consecutive.load(Ordering::Relaxed)
    }

    /// Failed passes since the watcher started.
    pub fn total_failures(&self) -> u64 {
        self.stats.total.load(Ordering::Relaxed)
    }

    /// Lets any in-flight pass finish, then stops the thread and waits for
    /// it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Blocks until the watcher thread exits, which only happens if it is
    /// signalled from elsewhere or the process ends.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("watcher thread panicked outside a pass");
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // The thread may already be gone; nothing to signal then.
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("watcher thread panicked outside a pass");
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
