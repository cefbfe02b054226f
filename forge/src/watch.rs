//! `forge watch`: follow the run log while an execute session is active.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use notify::{Event as NotifyEvent, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::io::mailbox::is_active;
use crate::io::paths::ForgePaths;
use crate::io::run_log::{LogEntry, log_len, read_recent, read_since};
use crate::steer::SteerError;

/// Entries shown when watching starts.
pub const RECENT_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// The sentinel disappeared.
    SessionEnded,
    /// The caller cancelled (Ctrl-C).
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub sentinel_poll: Duration,
    pub log_poll: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            sentinel_poll: Duration::from_secs(3),
            log_poll: Duration::from_millis(500),
        }
    }
}

/// One run-log entry as a terminal line.
pub fn format_entry(entry: &LogEntry) -> String {
    let time = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| entry.timestamp.clone());
    let mut line = format!("  {time}  {:<8} {}", entry.action, entry.status);
    if let Some(duration) = &entry.duration {
        line.push_str(&format!(" ({duration})"));
    }
    if let Some(cost) = entry.cost {
        line.push_str(&format!(" ${cost:.2}"));
    }
    if let Some(details) = &entry.details {
        line.push_str(&format!(" - {details}"));
    }
    line
}

pub async fn watch<W: Write>(
    paths: &ForgePaths,
    options: WatchOptions,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<WatchEnd> {
    if !is_active(paths) {
        return Err(SteerError::NoActiveSession.into());
    }
    writeln!(out, "  Watching execute session (Ctrl-C to stop)").context("write watch header")?;
    for entry in read_recent(&paths.log_path, RECENT_ENTRIES)? {
        writeln!(out, "{}", format_entry(&entry)).context("write log entry")?;
    }
    out.flush().context("flush watch output")?;
    let mut offset = log_len(&paths.log_path);

    let (tx, mut rx) = mpsc::channel::<()>(16);
    let log_name = paths.log_path.file_name().map(ToOwned::to_owned);
    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res
                && event
                    .paths
                    .iter()
                    .any(|path| path.file_name().map(ToOwned::to_owned) == log_name)
            {
                let _ = tx.try_send(());
            }
        },
        notify::Config::default().with_poll_interval(options.log_poll),
    )
    .context("create log watcher")?;
    watcher
        .watch(&paths.state_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watch {}", paths.state_dir.display()))?;
    info!(log = %paths.log_path.display(), "watching run log");

    let mut sentinel_tick = tokio::time::interval(options.sentinel_poll);
    sentinel_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    sentinel_tick.tick().await;

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break WatchEnd::Stopped,
            Some(()) = rx.recv() => {
                print_new(paths, &mut offset, out)?;
            }
            _ = sentinel_tick.tick() => {
                if !is_active(paths) {
                    print_new(paths, &mut offset, out)?;
                    break WatchEnd::SessionEnded;
                }
            }
        }
    };
    drop(watcher);

    let farewell = match end {
        WatchEnd::SessionEnded => "Session ended.",
        WatchEnd::Stopped => "Stopped watching.",
    };
    writeln!(out, "\n  {farewell}").context("write watch footer")?;
    out.flush().context("flush watch output")?;
    debug!(end = ?end, "watch finished");
    Ok(end)
}

fn print_new<W: Write>(paths: &ForgePaths, offset: &mut u64, out: &mut W) -> Result<()> {
    for entry in read_since(&paths.log_path, offset)? {
        writeln!(out, "{}", format_entry(&entry)).context("write log entry")?;
    }
    out.flush().context("flush watch output")
}
