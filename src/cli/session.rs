//! Interactive session: a line-oriented front end with the watcher running
//! in the background.
//!
//! Commands, one per line:
//!
//! ```text
//! add            paste notes, end with a line holding only "."
//! list           show the table
//! toggle <REF>   flip done/open; REF is an id prefix or #row
//! help
//! quit
//! ```

use std::io::{self, BufRead, Write};

use jiff::{SignedDuration, Timestamp};

use crate::board::Board;
use crate::extract::Extractor;
use crate::watcher::WatcherHandle;

use super::format::{format_task, render_table};

const HELP: &str = "\
commands:
  add            paste notes, end with a line holding only \".\"
  list           show the table
  toggle <REF>   flip done/open; REF is an id prefix or #row
  help           show this help
  quit           stop the watcher and exit";

/// Settings for one session.
pub struct Session<'a> {
    pub board: &'a Board,
    /// Why extraction is unavailable, when it is (e.g. no API key).
    pub extractor: Result<&'a dyn Extractor, String>,
    pub watcher: Option<&'a WatcherHandle>,
    pub stale_after: SignedDuration,
    pub color: bool,
}

impl Session<'_> {
    /// Read commands from `input` until `quit` or end of input.
    pub fn run(&self, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
        let mut lines = input.lines();
        self.list(&mut out)?;
        writeln!(out, "type `help` for commands")?;

        loop {
            write!(out, "> ")?;
            out.flush()?;

            let Some(line) = lines.next().transpose()? else {
                break;
            };
            let line = line.trim();
            let (command, arg) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(c, a)| (c, a.trim()));

            match command {
                "" => continue,
                "quit" | "exit" => break,
                "help" => writeln!(out, "{HELP}")?,
                "list" => self.list(&mut out)?,
                "add" => {
                    let text = read_block(&mut lines)?;
                    self.add(&text, &mut out)?;
                }
                "toggle" => self.toggle(arg, &mut out)?,
                other => writeln!(out, "unknown command '{other}'; type `help`")?,
            }

            self.report_watcher(&mut out)?;
        }

        Ok(())
    }

    fn list(&self, out: &mut impl Write) -> io::Result<()> {
        if let Err(e) = self.board.reload() {
            writeln!(out, "could not re-read the task file: {e}")?;
        }
        let table = render_table(
            &self.board.snapshot(),
            Timestamp::now(),
            self.stale_after,
            self.color,
        );
        write!(out, "{table}")
    }

    fn add(&self, text: &str, out: &mut impl Write) -> io::Result<()> {
        let extractor = match &self.extractor {
            Ok(extractor) => *extractor,
            Err(reason) => return writeln!(out, "extraction unavailable: {reason}"),
        };

        match self.board.submit(extractor, text) {
            Ok(added) if added.is_empty() => writeln!(out, "no tasks found"),
            Ok(added) => {
                writeln!(out, "added {} task(s):", added.len())?;
                for task in &added {
                    writeln!(out, "  {}", format_task(task))?;
                }
                Ok(())
            }
            Err(e) => writeln!(out, "could not add tasks: {e}\nthe list is unchanged; try again"),
        }
    }

    fn toggle(&self, reference: &str, out: &mut impl Write) -> io::Result<()> {
        if reference.is_empty() {
            return writeln!(out, "usage: toggle <id-prefix | #row>");
        }

        let result = match reference.strip_prefix('#') {
            Some(row) => match row.parse::<usize>() {
                Ok(n) if n >= 1 => self.board.toggle_at(n - 1),
                _ => return writeln!(out, "'{reference}' is not a row number"),
            },
            None => self.board.toggle(reference),
        };

        match result {
            Ok(task) => writeln!(out, "{}", format_task(&task)),
            Err(e) => writeln!(out, "{e}"),
        }
    }

    fn report_watcher(&self, out: &mut impl Write) -> io::Result<()> {
        if let Some(watcher) = self.watcher {
            let failures = watcher.consecutive_failures();
            if failures > 0 {
                writeln!(
                    out,
                    "warning: the background watcher has failed {failures} pass(es) in a row"
                )?;
            }
        }
        Ok(())
    }
}

/// Collect lines up to a lone `.` (or end of input).
fn read_block(lines: &mut impl Iterator<Item = io::Result<String>>) -> io::Result<String> {
    let mut text = String::new();
    for line in lines {
        let line = line?;
        if line.trim() == "." {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}
