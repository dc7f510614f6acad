//! Progress table rendering.
//!
//! The dispatcher hands every cycle's snapshot to a [`ProgressReporter`]. The
//! terminal implementation redraws a plain-text table; [`NoopReporter`] is
//! used for non-interactive runs and in tests.

use std::io::Write;

use crate::types::ProgressRecord;

/// Column headings of the progress table
pub const PROGRESS_HEADER: [&str; 5] = ["Title", "Status", "Progress (%)", "Events", "Runtime (s)"];

/// ANSI clear-screen and cursor-home sequence
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Receives the progress snapshot once per dispatcher cycle
pub trait ProgressReporter: Send + Sync {
    /// Render the current state of every job
    fn render(&self, snapshot: &[ProgressRecord]);
}

/// Discards every snapshot
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn render(&self, _snapshot: &[ProgressRecord]) {}
}

/// Redraws the progress table on stdout
#[derive(Clone, Copy, Debug)]
pub struct TerminalReporter {
    clear: bool,
}

impl TerminalReporter {
    /// Reporter that clears the screen before each redraw
    pub fn new() -> Self {
        Self { clear: true }
    }

    /// Reporter that appends tables without clearing (useful when piping output)
    pub fn appending() -> Self {
        Self { clear: false }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalReporter {
    fn render(&self, snapshot: &[ProgressRecord]) {
        let mut out = std::io::stdout().lock();
        let prefix = if self.clear { CLEAR_SCREEN } else { "" };
        // A closed stdout must not take the batch down with it
        if let Err(e) = write!(out, "{prefix}Search Progress\n{}", format_table(snapshot))
            .and_then(|_| out.flush())
        {
            tracing::debug!(error = %e, "failed to draw progress table");
        }
    }
}

/// Format a snapshot as a left-aligned table with a header rule
pub fn format_table(snapshot: &[ProgressRecord]) -> String {
    let rows: Vec<[String; 5]> = snapshot
        .iter()
        .map(|r| {
            [
                r.title.clone(),
                r.status.clone(),
                format!("{:.2}", r.progress_percent),
                r.events.to_string(),
                format!("{:.1}", r.runtime_secs),
            ]
        })
        .collect();

    let mut widths = PROGRESS_HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut table = String::new();
    push_line(&mut table, &PROGRESS_HEADER.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    table.push_str(&rule.join("  "));
    table.push('\n');
    for row in &rows {
        push_line(&mut table, row, &widths);
    }
    table
}

fn push_line(table: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    table.push_str(padded.join("  ").trim_end());
    table.push('\n');
}
