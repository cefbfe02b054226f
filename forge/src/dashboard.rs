//! Terminal rendering of session activity.
//!
//! [`ActivityTracker`] decides *what* to show; this module decides *how*:
//! colour-coded per participant when colour is enabled, plain bracketed
//! prefixes otherwise.

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::core::activity::{Activity, ActivityLine, ActivityTracker, SummaryRow};
use crate::core::event::SessionEvent;

/// Participant colours; the lead always gets the first.
pub const PALETTE: [&str; 8] = [
    "\x1b[36m", "\x1b[33m", "\x1b[35m", "\x1b[32m", "\x1b[34m", "\x1b[91m", "\x1b[93m",
    "\x1b[95m",
];
pub const RESET: &str = "\x1b[0m";
pub const DIM: &str = "\x1b[2m";
pub const SHOW_CURSOR: &str = "\x1b[?25h";

const SUMMARY_NAME_WIDTH: usize = 24;
const SUMMARY_STATUS_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Colour when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Auto => io::stdout().is_terminal(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// `Ns` under a minute, `Mm Ss` above, rounded to the nearest second.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().round() as u64;
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

pub struct Dashboard<W: Write> {
    tracker: ActivityTracker,
    out: W,
    color: bool,
}

impl Dashboard<io::Stdout> {
    pub fn stdout(stage: &str, mode: ColorMode) -> Self {
        Dashboard::new(stage, io::stdout(), mode.enabled())
    }
}

impl<W: Write> Dashboard<W> {
    pub fn new(stage: &str, out: W, color: bool) -> Self {
        Self {
            tracker: ActivityTracker::new(stage, Instant::now()),
            out,
            color,
        }
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    pub fn on_event(&mut self, event: &SessionEvent) -> Result<()> {
        self.on_event_at(event, Instant::now())
    }

    pub fn on_event_at(&mut self, event: &SessionEvent, now: Instant) -> Result<()> {
        for activity in self.tracker.on_event(event, now) {
            match activity {
                Activity::Line(line) => self.write_line(&line)?,
                Activity::Summary(rows) => self.write_summary(&rows)?,
            }
        }
        self.out.flush().context("flush dashboard")
    }

    /// A line from forge itself rather than a participant.
    pub fn notice(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "  {text}").context("write dashboard notice")
    }

    /// Restore the cursor in case the provider hid it.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.color {
            write!(self.out, "{SHOW_CURSOR}").context("restore cursor")?;
        }
        self.out.flush().context("flush dashboard")
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &ActivityLine) -> Result<()> {
        let written = if self.color {
            let width = self.tracker.name_width();
            writeln!(
                self.out,
                "{}  ● {:<width$}{RESET} {}",
                palette_color(line.palette_index),
                line.speaker,
                line.text,
            )
        } else {
            writeln!(self.out, "  [{}] {}", line.speaker, line.text)
        };
        written.context("write dashboard line")
    }

    fn write_summary(&mut self, rows: &[SummaryRow]) -> Result<()> {
        let plural = if rows.len() == 1 { "" } else { "s" };
        let (dim, reset) = if self.color { (DIM, RESET) } else { ("", "") };
        writeln!(
            self.out,
            "\n  {dim}Agent Team ({} teammate{plural}):{reset}",
            rows.len()
        )
        .context("write summary header")?;
        for row in rows {
            let elapsed = format_elapsed(row.elapsed);
            let written = if self.color {
                writeln!(
                    self.out,
                    "{}    • {:<SUMMARY_NAME_WIDTH$} {:<SUMMARY_STATUS_WIDTH$}{RESET} ({elapsed})",
                    palette_color(row.palette_index),
                    row.name,
                    row.status.as_str(),
                )
            } else {
                writeln!(
                    self.out,
                    "    - {:<SUMMARY_NAME_WIDTH$} {:<SUMMARY_STATUS_WIDTH$} ({elapsed})",
                    row.name,
                    row.status.as_str(),
                )
            };
            written.context("write summary row")?;
        }
        Ok(())
    }
}
