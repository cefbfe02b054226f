//! `forge inform` and `forge abort`: out-of-band steering of a live session.

use std::path::PathBuf;

use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

use crate::io::mailbox::{self, LEAD_TARGET, SentinelRemoval, is_active, remove_sentinel};
use crate::io::paths::ForgePaths;
use crate::io::prompt::abort_message;
use crate::io::run_log::{LogEntry, append_entry};
use crate::session::commit_progress;

pub const ABORT_COMMIT: &str = "forge: execute aborted by user";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SteerError {
    #[error("no active execute session (start one with `forge execute`)")]
    NoActiveSession,
}

/// What `abort` managed to do. Every step is best-effort except the message.
#[derive(Debug, Clone)]
pub struct AbortReport {
    pub sentinel: SentinelRemoval,
    pub message_path: PathBuf,
    pub committed: bool,
}

/// Queue `message` for `agent` in the running session.
pub fn inform(paths: &ForgePaths, agent: &str, message: &str) -> Result<PathBuf> {
    if !is_active(paths) {
        return Err(SteerError::NoActiveSession.into());
    }
    let path = mailbox::write(paths, agent, message)?;
    info!(agent, path = %path.display(), "message queued");
    append_entry(
        &paths.log_path,
        &LogEntry::now("inform", "queued").with_details(format!("{agent}: {message}")),
    )?;
    Ok(path)
}

/// Ask the lead to shut down and commit whatever is on disk.
///
/// There is no forcible stop: the session ends only when the lead honours
/// the queued message.
pub fn abort(paths: &ForgePaths) -> Result<AbortReport> {
    if !is_active(paths) {
        return Err(SteerError::NoActiveSession.into());
    }
    let sentinel = match remove_sentinel(paths) {
        Ok(removal) => removal,
        Err(err) => {
            warn!(err = %err, "could not remove sentinel");
            SentinelRemoval::AlreadyGone
        }
    };
    let message_path = mailbox::write(paths, LEAD_TARGET, abort_message())?;
    let committed = commit_progress(paths, ABORT_COMMIT);
    append_entry(
        &paths.log_path,
        &LogEntry::now("abort", "requested").with_details(if committed {
            "partial progress committed"
        } else {
            "nothing committed"
        }),
    )?;
    info!(committed, "abort requested");
    Ok(AbortReport {
        sentinel,
        message_path,
        committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mailbox::{Sentinel, consume};
    use crate::io::run_log::read_recent;
    use crate::test_support::TestRepo;
    use std::fs;

    #[test]
    fn inform_requires_active_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        let err = inform(&paths, "backend", "hi").expect_err("inactive");
        assert_eq!(err.downcast_ref::<SteerError>(), Some(&SteerError::NoActiveSession));
        assert!(!paths.inbox_dir.exists());
    }

    #[test]
    fn inform_queues_message_and_logs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        let _sentinel = Sentinel::create(&paths).expect("sentinel");

        inform(&paths, "backend", "use postgres").expect("inform");
        let drain = consume(&paths).expect("consume");
        assert_eq!(drain.messages.len(), 1);
        assert_eq!(drain.messages[0].target_agent, "backend");

        let log = read_recent(&paths.log_path, 5).expect("log");
        assert_eq!(log[0].action, "inform");
        assert_eq!(log[0].details.as_deref(), Some("backend: use postgres"));
    }

    #[test]
    fn abort_removes_sentinel_messages_lead_and_commits() {
        let repo = TestRepo::new().expect("repo");
        let paths = ForgePaths::new(repo.path());
        let sentinel = Sentinel::create(&paths).expect("sentinel");
        fs::write(repo.path().join("half-done.rs"), "fn main() {}\n").expect("write");

        let report = abort(&paths).expect("abort");
        assert_eq!(report.sentinel, SentinelRemoval::Removed);
        assert!(!is_active(&paths));
        assert!(report.committed);
        assert_eq!(repo.subjects().expect("log")[0], ABORT_COMMIT);

        let drain = consume(&paths).expect("consume");
        assert_eq!(drain.messages.len(), 1);
        assert_eq!(drain.messages[0].target_agent, LEAD_TARGET);
        assert!(drain.messages[0].message.starts_with("USER ABORT"));

        // The channel's own release still succeeds after an abort.
        assert_eq!(sentinel.release().expect("release"), SentinelRemoval::AlreadyGone);
    }

    #[test]
    fn abort_without_session_changes_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        let err = abort(&paths).expect_err("inactive");
        assert!(err.downcast_ref::<SteerError>().is_some());
        assert!(!paths.log_path.exists());
    }
}
