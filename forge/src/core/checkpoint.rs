//! Wave checkpoints recorded as commit subjects.
//!
//! A wave is checkpointed by committing with a subject containing
//! `execute wave <N> complete`. The checkpoint is never stored elsewhere; it is
//! recomputed from history every time.

use std::sync::LazyLock;

use regex::Regex;

/// Substring handed to `git log --grep` to narrow the history scan.
pub const WAVE_GREP: &str = "execute wave";

static WAVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"execute wave (\d+) complete").expect("wave checkpoint pattern should be valid")
});

/// Subject line for a commit that checkpoints `wave`.
pub fn wave_commit_subject(wave: u32) -> String {
    format!("forge: execute wave {wave} complete")
}

/// Extract the checkpoint from `git log --oneline` output (most recent first).
///
/// Only the first non-empty line is considered; if it does not carry a wave
/// number there is no checkpoint, even when older lines would match.
pub fn parse_wave_checkpoint(log_oneline: &str) -> Option<u32> {
    let first = log_oneline.lines().find(|line| !line.trim().is_empty())?;
    let caps = WAVE_RE.captures(first)?;
    caps.get(1)?.as_str().parse().ok()
}
