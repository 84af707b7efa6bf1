//! Table rendering for CLI display.

use std::fmt::Write;

use jiff::{SignedDuration, Timestamp};

use crate::model::Task;
use crate::view::{HEADERS, TaskRow, short_id};

/// Render tasks as an aligned table, one row per task, numbered from 1.
///
/// With `color`, rows get their tone as a 24-bit background and stale rows
/// blink. Without it, stale rows are marked with `*` after the row number.
pub(super) fn render_table(
    tasks: &[Task],
    now: Timestamp,
    stale_after: SignedDuration,
    color: bool,
) -> String {
    if tasks.is_empty() {
        return "No tasks\n".to_string();
    }

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|t| TaskRow::from_task(t, now, stale_after, true))
        .collect();

    let numbers: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let marker = if row.stale && !color { "*" } else { "" };
            format!("{}{marker}", i + 1)
        })
        .collect();

    let number_width = numbers.iter().map(|n| width(n)).max().unwrap_or(1).max(1);
    let mut widths = HEADERS.map(width);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.cells()) {
            *w = (*w).max(width(cell));
        }
    }

    let mut out = String::new();
    out.push_str(&line("#", &HEADERS, number_width, &widths));
    out.push('\n');

    for (number, row) in numbers.iter().zip(&rows) {
        let text = line(number, &row.cells(), number_width, &widths);
        if color {
            let (r, g, b) = row.tone.rgb();
            let blink = if row.stale { "5;" } else { "" };
            let _ = write!(out, "\x1b[{blink}97;48;2;{r};{g};{b}m{text}\x1b[0m");
        } else {
            out.push_str(&text);
        }
        out.push('\n');
    }

    if !color && rows.iter().any(|r| r.stale) {
        out.push_str("* stale: open longer than ");
        out.push_str(&describe_hours(stale_after));
        out.push('\n');
    }

    out
}

/// One-line summary of a task, used after add and toggle.
pub(super) fn format_task(task: &Task) -> String {
    let short_id = short_id(task.id);
    let state = if task.completed { "done" } else { "open" };
    let assignee = task
        .assignee
        .as_deref()
        .map(|a| format!(" @{a}"))
        .unwrap_or_default();
    format!(
        "{short_id}  [{state}] [{}]{assignee}  {}",
        task.priority, task.description
    )
}

fn line(number: &str, cells: &[&str; 7], number_width: usize, widths: &[usize; 7]) -> String {
    let mut s = pad(number, number_width);
    for (cell, w) in cells.iter().zip(widths) {
        s.push_str("  ");
        s.push_str(&pad(cell, *w));
    }
    s.trim_end().to_string()
}

fn pad(s: &str, w: usize) -> String {
    let fill = w.saturating_sub(width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn describe_hours(d: SignedDuration) -> String {
    match d.as_hours() {
        1 => "1 hour".to_string(),
        h => format!("{h} hours"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn sample() -> Vec<Task> {
        let mut a = Task::new("Book render farm", "high", ts("2024-01-01T00:00:00Z"));
        a.id = "8d3f0c12-0000-4000-8000-000000000001".parse().unwrap();
        let mut b = Task::new("Send storyboard", "medium", ts("2024-01-03T00:00:00Z"));
        b.assignee = Some("Mahmoud".into());
        b.start_time = Some(ts("2024-01-03T01:00:00Z"));
        b.completed = true;
        vec![a, b]
    }

    #[test]
    fn empty_list() {
        let out = render_table(&[], Timestamp::now(), SignedDuration::from_hours(24), false);
        assert_eq!(out, "No tasks\n");
    }

    #[test]
    fn plain_table_aligns_and_marks_stale() {
        let tasks = sample();
        let out = render_table(
            &tasks,
            ts("2024-01-03T12:00:00Z"),
            SignedDuration::from_hours(24),
            false,
        );
        let lines: Vec<&str> = out.lines().collect();
        let second_id = &tasks[1].id.to_string()[..8];

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("#   Id        Description"));
        assert!(lines[1].starts_with("1*  8d3f0c12  Book render farm  -"));
        assert!(lines[2].starts_with(&format!("2   {second_id}  Send storyboard   Mahmoud")));
        assert!(lines[2].ends_with("2024-01-03  ✓"));
        assert_eq!(lines[3], "* stale: open longer than 24 hours");
    }

    #[test]
    fn colored_table_uses_tones() {
        let tasks = sample();
        let out = render_table(
            &tasks,
            ts("2024-01-03T12:00:00Z"),
            SignedDuration::from_hours(24),
            true,
        );

        // Stale open row: blink tone plus the blink attribute.
        assert!(out.contains("\x1b[5;97;48;2;179;0;89m1  8d3f0c12  Book render farm"));
        // Completed row: grey.
        let second_id = &tasks[1].id.to_string()[..8];
        assert!(out.contains(&format!(
            "\x1b[97;48;2;110;110;110m2  {second_id}  Send storyboard"
        )));
        assert!(!out.contains("* stale"));
    }

    #[test]
    fn task_summary_line() {
        let tasks = sample();
        assert_eq!(
            format_task(&tasks[0]),
            "8d3f0c12  [open] [high]  Book render farm"
        );
        assert!(format_task(&tasks[1]).contains("[done] [medium] @Mahmoud  Send storyboard"));
    }
}
