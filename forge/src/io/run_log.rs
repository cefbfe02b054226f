//! Append-only run log at `<state>/log.jsonl`.
//!
//! One JSON object per line. This is product output (read by `forge watch`),
//! separate from tracing diagnostics.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 time the entry was written.
    pub timestamp: String,
    pub action: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Entry stamped with the current time.
    pub fn now(action: &str, status: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action: action.to_string(),
            status: status.to_string(),
            duration: None,
            cost: None,
            details: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(format_duration(duration));
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// `Ns` under a minute, `Mm Ss` above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

pub fn append_entry(path: &Path, entry: &LogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(entry).context("serialize log entry")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open run log {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append run log {}", path.display()))?;
    debug!(action = %entry.action, status = %entry.status, "run log entry");
    Ok(())
}

/// The last `count` entries, oldest first. A missing log is empty.
pub fn read_recent(path: &Path, count: usize) -> Result<Vec<LogEntry>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("read run log {}", path.display())),
    };
    let entries = parse_lines(&contents);
    let skip = entries.len().saturating_sub(count);
    Ok(entries.into_iter().skip(skip).collect())
}

/// Byte length of the log, or 0 when it does not exist yet.
pub fn log_len(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

/// Entries appended since `offset`, advancing `offset` past complete lines.
///
/// A log that shrank below `offset` was replaced and is read from the start.
/// A trailing partial line is left for the next call.
pub fn read_since(path: &Path, offset: &mut u64) -> Result<Vec<LogEntry>> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("open run log {}", path.display())),
    };
    let len = file
        .metadata()
        .with_context(|| format!("stat run log {}", path.display()))?
        .len();
    if len < *offset {
        *offset = 0;
    }
    file.seek(SeekFrom::Start(*offset))
        .with_context(|| format!("seek run log {}", path.display()))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .with_context(|| format!("read run log {}", path.display()))?;

    let complete = match buf.rfind('\n') {
        Some(idx) => &buf[..=idx],
        None => return Ok(Vec::new()),
    };
    *offset += complete.len() as u64;
    Ok(parse_lines(complete))
}

fn parse_lines(contents: &str) -> Vec<LogEntry> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(err = %err, "skipping malformed run log line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: &str) -> LogEntry {
        LogEntry::now(action, "success")
    }

    #[test]
    fn durations_switch_to_minutes() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_millis(185_900)), "3m 5s");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let line = serde_json::to_string(&entry("inform")).expect("json");
        assert!(!line.contains("duration"));
        assert!(!line.contains("cost"));
        let full = entry("execute")
            .with_duration(Duration::from_secs(5))
            .with_cost(1.25)
            .with_details("waves 1-2");
        let line = serde_json::to_string(&full).expect("json");
        assert!(line.contains("\"duration\":\"5s\""));
        assert!(line.contains("\"cost\":1.25"));
    }

    #[test]
    fn recent_entries_are_the_tail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".forge/log.jsonl");
        assert!(read_recent(&path, 5).expect("missing").is_empty());

        for i in 0..7 {
            append_entry(&path, &entry(&format!("a{i}"))).expect("append");
        }
        let recent = read_recent(&path, 5).expect("read");
        let actions: Vec<&str> = recent.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["a2", "a3", "a4", "a5", "a6"]);
    }

    #[test]
    fn read_since_only_returns_new_complete_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("log.jsonl");
        append_entry(&path, &entry("first")).expect("append");
        let mut offset = log_len(&path);

        append_entry(&path, &entry("second")).expect("append");
        let mut file = OpenOptions::new().append(true).open(&path).expect("open");
        file.write_all(b"{\"timestamp\":\"x\"").expect("partial");

        let new = read_since(&path, &mut offset).expect("read");
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].action, "second");
        assert!(read_since(&path, &mut offset).expect("again").is_empty());
    }

    #[test]
    fn truncated_log_is_reread() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("log.jsonl");
        append_entry(&path, &entry("old")).expect("append");
        append_entry(&path, &entry("older")).expect("append");
        let mut offset = log_len(&path);

        fs::write(&path, "").expect("truncate");
        append_entry(&path, &entry("fresh")).expect("append");
        let new = read_since(&path, &mut offset).expect("read");
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].action, "fresh");
    }
}
