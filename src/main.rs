use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use todo_ai::board::{Board, BoardError};
use todo_ai::cli::{self, Cli};
use todo_ai::store::{Store, StoreError};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli::load_config(&cli).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}");
        process::exit(1);
    });

    let path = config.store_path().unwrap_or_else(|e| {
        eprintln!("Could not locate the task file: {e}");
        process::exit(1);
    });

    // `add`, `toggle` and a long-running `watch` may share the file from
    // separate processes.
    let board = match Store::new(path).map_err(BoardError::from).and_then(Board::open) {
        Ok(b) => b.following_disk(),
        Err(BoardError::Store(e @ StoreError::Parse { .. })) => {
            eprintln!("Refusing to start: {e}");
            eprintln!("Fix or move the file aside; it will not be overwritten.");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to open task list: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(&cli, &config, &board) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
