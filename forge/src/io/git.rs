//! Git adapter for checkpoint discovery and stage commits.
//!
//! Git is treated as an opaque command runner; this is a small, explicit
//! wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::checkpoint::{WAVE_GREP, parse_wave_checkpoint};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn init(&self) -> Result<()> {
        self.run_checked(&["init", "--quiet"])?;
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!(message, "committing staged changes");
        self.run_checked(&["commit", "--quiet", "-m", message])?;
        Ok(true)
    }

    /// Stage everything and commit it. `Ok(false)` means nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<bool> {
        self.add_all()?;
        self.commit_staged(message)
    }

    /// `git log --oneline --all --grep=<pattern>`, most recent first.
    pub fn log_grep_all(&self, pattern: &str) -> Result<String> {
        let grep = format!("--grep={pattern}");
        self.run_capture(&["log", "--oneline", "--all", &grep])
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Most recent wave checkpoint across all refs.
///
/// `Ok(None)` means the history was readable but holds no checkpoint.
#[instrument(skip_all, fields(workdir = %git.workdir().display()))]
pub fn query_wave_checkpoint(git: &Git) -> Result<Option<u32>> {
    let log = git.log_grep_all(WAVE_GREP)?;
    let wave = parse_wave_checkpoint(&log);
    debug!(wave = ?wave, "wave checkpoint");
    Ok(wave)
}

/// Like [`query_wave_checkpoint`], but an unreadable history (no repository,
/// no commits) counts as "no checkpoint".
pub fn last_wave_checkpoint(git: &Git) -> Option<u32> {
    query_wave_checkpoint(git).unwrap_or_else(|err| {
        debug!(err = %err, "history unavailable, treating as no checkpoint");
        None
    })
}
