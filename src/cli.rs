//! CLI interface for todo-ai.
//!
//! Each subcommand except `session` is non-interactive: arguments in,
//! plain text out.
//!
//! - `todo-ai add`: extract tasks from notes and append them.
//! - `todo-ai list`: show the table.
//! - `todo-ai toggle <REF>`: flip a task between open and done.
//! - `todo-ai watch`: run the start-time watcher in the foreground.
//! - `todo-ai session`: interactive loop with the watcher in the background.

mod format;
mod session;

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use jiff::Timestamp;

use crate::board::Board;
use crate::config::Config;
use crate::extract::{Extractor, OpenAiExtractor};
use crate::watcher::Watcher;

use format::{format_task, render_table};
use session::Session;

/// todo-ai: turn meeting notes into a to-do list.
#[derive(Debug, Parser)]
#[command(name = "todo-ai", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Debug mode: verbose logs and a 10 second watcher interval.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use this config file instead of `~/.todo-ai/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow:
  1. todo-ai add --file notes.txt
     → prints the extracted tasks
  2. todo-ai list
  3. todo-ai toggle 8d3f        (id prefix from the `Id` column)
     todo-ai toggle --index 2   (row number from `list`)
  4. todo-ai session            (all of the above, with the watcher running)

Environment:
  OPENAI_API_KEY   key for task extraction
  TODO_AI_STORE    task file (default ~/.todo-ai/todos.json)
  RUST_LOG         log filter (default warn)"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract tasks from notes and append them to the list.
    ///
    /// Reads the notes from `--file`, or stdin when omitted.
    /// On failure the list is left unchanged.
    Add {
        /// Read notes from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show all tasks.
    ///
    /// Rows are coloured by priority, completed rows are grey and stale rows
    /// blink when stdout is a terminal.
    List,

    /// Flip a task between open and done.
    Toggle {
        /// Task id: full UUID or unambiguous prefix (e.g. `8d3f`).
        #[arg(required_unless_present = "index", conflicts_with = "index")]
        reference: Option<String>,

        /// Row number as shown by `list`, starting at 1.
        #[arg(long)]
        index: Option<usize>,
    },

    /// Run the start-time watcher in the foreground.
    ///
    /// Stamps a start time on every open task not yet seen, then repeats
    /// every interval until killed.
    Watch {
        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,
    },

    /// Interactive session with the watcher running in the background.
    Session,
}

/// Load config for the given CLI flags.
pub fn load_config(cli: &Cli) -> Result<Config, String> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Run a parsed command, returning an error message on failure.
pub fn run(cli: &Cli, config: &Config, board: &Board) -> Result<(), String> {
    match &cli.command {
        Command::Add { file } => cmd_add(config, board, file.as_deref()),
        Command::List => cmd_list(config, board),
        Command::Toggle { reference, index } => {
            cmd_toggle(board, reference.as_deref(), *index)
        }
        Command::Watch { once } => cmd_watch(config, board, cli.debug, *once),
        Command::Session => cmd_session(config, board, cli.debug),
    }
}

fn cmd_add(config: &Config, board: &Board, file: Option<&Path>) -> Result<(), String> {
    let text = match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            text
        }
    };

    let extractor = OpenAiExtractor::new(config.extractor_config()).map_err(|e| e.to_string())?;
    let added = board
        .submit(&extractor, &text)
        .map_err(|e| format!("could not add tasks: {e}\nThe task list was not changed."))?;

    if added.is_empty() {
        eprintln!("No tasks found");
        return Ok(());
    }

    for task in &added {
        println!("{}", format_task(task));
    }
    eprintln!("Added {} task(s)", added.len());
    Ok(())
}

fn cmd_list(config: &Config, board: &Board) -> Result<(), String> {
    let color = io::stdout().is_terminal();
    print!(
        "{}",
        render_table(&board.snapshot(), Timestamp::now(), config.stale_after(), color)
    );
    Ok(())
}

fn cmd_toggle(board: &Board, reference: Option<&str>, index: Option<usize>) -> Result<(), String> {
    let task = match (reference, index) {
        (_, Some(0)) => return Err("rows are numbered from 1".to_string()),
        (_, Some(row)) => board.toggle_at(row - 1),
        (Some(reference), None) => board.toggle(reference),
        (None, None) => return Err("specify a task id or --index".to_string()),
    }
    .map_err(|e| format!("failed to toggle task: {e}"))?;

    println!("{}", format_task(&task));
    Ok(())
}

fn cmd_watch(config: &Config, board: &Board, debug: bool, once: bool) -> Result<(), String> {
    let watcher = Watcher::new(board.clone(), config.watch_interval(debug));

    if once {
        let stamped = watcher
            .run_pass()
            .map_err(|e| format!("watcher pass failed: {e}"))?;
        eprintln!("Stamped {stamped} task(s)");
        return Ok(());
    }

    eprintln!(
        "Watching {} every {}s (Ctrl-C to stop)",
        board.store().path().display(),
        watcher.interval().as_secs()
    );
    watcher
        .spawn()
        .map_err(|e| format!("failed to start watcher: {e}"))?
        .wait();
    Ok(())
}

fn cmd_session(config: &Config, board: &Board, debug: bool) -> Result<(), String> {
    let extractor = OpenAiExtractor::new(config.extractor_config()).map_err(|e| e.to_string());
    let watcher = Watcher::new(board.clone(), config.watch_interval(debug))
        .spawn()
        .map_err(|e| format!("failed to start watcher: {e}"))?;

    let session = Session {
        board,
        extractor: extractor.as_ref().map(|e| e as &dyn Extractor).map_err(Clone::clone),
        watcher: Some(&watcher),
        stale_after: config.stale_after(),
        color: io::stdout().is_terminal(),
    };
    let result = session
        .run(io::stdin().lock(), io::stdout().lock())
        .map_err(|e| format!("session I/O error: {e}"));

    watcher.shutdown();
    result
}
