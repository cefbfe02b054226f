//! File-backed mailbox for steering a running session.
//!
//! Each message is one JSON file named `<epochMillis>-<targetAgent>.json` in
//! the inbox directory, so a lexical sort is a chronological sort. Consuming a
//! message deletes its file; a message is delivered at most once. Two messages
//! for the same target written within the same millisecond share a filename
//! and the later one replaces the earlier.
//!
//! The sentinel `.active` in the same directory marks a live steering channel.
//! Only its existence matters; the content is an informational timestamp.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::paths::ForgePaths;

/// Target used for messages addressed to the lead participant.
pub const LEAD_TARGET: &str = "lead";

const MESSAGE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxMessage {
    pub target_agent: String,
    pub message: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
}

/// A message file that was removed from the inbox but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedMessage {
    pub file: PathBuf,
    pub reason: String,
}

/// Result of one mailbox drain.
#[derive(Debug, Default)]
pub struct Drain {
    /// Parsed messages in creation order.
    pub messages: Vec<MailboxMessage>,
    /// Malformed files. They are deleted all the same; nothing is retried.
    pub dropped: Vec<DroppedMessage>,
}

/// Outcome of deleting the sentinel; a missing file is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelRemoval {
    Removed,
    AlreadyGone,
}

/// Queue a message for `target_agent`. Returns the path of the new file.
#[instrument(skip_all, fields(target_agent = %target_agent))]
pub fn write(paths: &ForgePaths, target_agent: &str, message: &str) -> Result<PathBuf> {
    if target_agent.is_empty() || target_agent.contains(['/', '\\']) {
        return Err(anyhow!("invalid agent name '{target_agent}'"));
    }
    fs::create_dir_all(&paths.inbox_dir)
        .with_context(|| format!("create inbox {}", paths.inbox_dir.display()))?;

    let now = Utc::now();
    let payload = MailboxMessage {
        target_agent: target_agent.to_string(),
        message: message.to_string(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let filename = format!("{}-{}{}", now.timestamp_millis(), target_agent, MESSAGE_SUFFIX);
    let path = paths.inbox_dir.join(filename);

    let mut buf = serde_json::to_string_pretty(&payload).context("serialize mailbox message")?;
    buf.push('\n');
    write_atomic(&path, &buf)?;
    debug!(path = %path.display(), "queued mailbox message");
    Ok(path)
}

/// Read and delete every pending message, oldest first.
///
/// Calling this again with nothing new returns an empty drain.
pub fn consume(paths: &ForgePaths) -> Result<Drain> {
    let mut drain = Drain::default();
    let entries = match fs::read_dir(&paths.inbox_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(drain),
        Err(err) => {
            return Err(err).with_context(|| format!("list inbox {}", paths.inbox_dir.display()));
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_message_file(path))
        .collect();
    files.sort();

    for file in files {
        let contents = match fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(err) => {
                // Usually a concurrent consumer got there first.
                debug!(file = %file.display(), err = %err, "message vanished before read");
                continue;
            }
        };
        if let Err(err) = fs::remove_file(&file) {
            warn!(file = %file.display(), err = %err, "could not delete message, skipping it");
            continue;
        }
        match serde_json::from_str::<MailboxMessage>(&contents) {
            Ok(message) => drain.messages.push(message),
            Err(err) => drain.dropped.push(DroppedMessage {
                file,
                reason: err.to_string(),
            }),
        }
    }
    Ok(drain)
}

/// True iff the sentinel exists.
pub fn is_active(paths: &ForgePaths) -> bool {
    paths.sentinel_path.exists()
}

/// Delete the sentinel directly.
pub fn remove_sentinel(paths: &ForgePaths) -> Result<SentinelRemoval> {
    match fs::remove_file(&paths.sentinel_path) {
        Ok(()) => Ok(SentinelRemoval::Removed),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(SentinelRemoval::AlreadyGone),
        Err(err) => Err(err)
            .with_context(|| format!("remove sentinel {}", paths.sentinel_path.display())),
    }
}

/// Ownership of a live sentinel file.
///
/// Exactly one `Sentinel` is responsible for deleting the file it created:
/// explicitly through [`Sentinel::release`], or on drop if that never happened.
#[derive(Debug)]
pub struct Sentinel {
    paths: ForgePaths,
    armed: bool,
}

impl Sentinel {
    /// Ensure the inbox exists and write the sentinel.
    pub fn create(paths: &ForgePaths) -> Result<Sentinel> {
        fs::create_dir_all(&paths.inbox_dir)
            .with_context(|| format!("create inbox {}", paths.inbox_dir.display()))?;
        let started = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        fs::write(&paths.sentinel_path, started)
            .with_context(|| format!("write sentinel {}", paths.sentinel_path.display()))?;
        debug!(path = %paths.sentinel_path.display(), "sentinel created");
        Ok(Sentinel {
            paths: paths.clone(),
            armed: true,
        })
    }

    pub fn release(mut self) -> Result<SentinelRemoval> {
        self.armed = false;
        remove_sentinel(&self.paths)
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        if self.armed
            && let Err(err) = remove_sentinel(&self.paths)
        {
            warn!(err = %err, "failed to remove sentinel on drop");
        }
    }
}

fn is_message_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(MESSAGE_SUFFIX) && !name.starts_with('.'))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp message {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("publish message {}", path.display()))?;
    Ok(())
}
