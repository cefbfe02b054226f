//! Resuming an execute run from its last wave checkpoint.

use std::io::Write;

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::core::stage::StageName;
use crate::dashboard::Dashboard;
use crate::io::config::ForgeConfig;
use crate::io::git::{Git, last_wave_checkpoint};
use crate::io::paths::ForgePaths;
use crate::io::prompt::resume_prompt;
use crate::io::provider::Provider;
use crate::session::{
    StageReport, StageRequest, commit_progress, launch_request, record_outcome, run_session,
    warn_stale,
};

pub const RESUME_COMPLETE: &str = "forge: execute resumed and completed";

/// Why a resume cannot start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResumeError {
    #[error("split stage not complete; run the full pipeline first")]
    SplitIncomplete,
    #[error("no wave checkpoints found; run a fresh execute instead")]
    NoCheckpoint,
}

#[derive(Debug, Clone)]
pub struct ResumePlan {
    /// Highest wave recorded as complete.
    pub last_wave: u32,
    /// Baseline prompt with the resumption clause appended.
    pub prompt: String,
}

impl ResumePlan {
    pub fn next_wave(&self) -> u32 {
        self.last_wave + 1
    }
}

/// Check preconditions and build the resume prompt.
pub fn plan_resume(paths: &ForgePaths, baseline: &str) -> Result<ResumePlan> {
    if !paths.artifact_path(StageName::Split).exists() {
        return Err(ResumeError::SplitIncomplete.into());
    }
    let git = Git::new(paths.root());
    let last_wave = last_wave_checkpoint(&git).ok_or(ResumeError::NoCheckpoint)?;
    let prompt = resume_prompt(baseline, last_wave)?;
    Ok(ResumePlan { last_wave, prompt })
}

pub async fn run_resume<P: Provider, W: Write>(
    provider: &P,
    paths: &ForgePaths,
    config: &ForgeConfig,
    request: StageRequest,
    dashboard: &mut Dashboard<W>,
) -> Result<StageReport> {
    let plan = plan_resume(paths, &request.prompt)?;
    info!(last_wave = plan.last_wave, "resuming execute");
    dashboard.notice(&format!(
        "Resuming from wave {} (waves 1-{} complete)",
        plan.next_wave(),
        plan.last_wave
    ))?;
    warn_stale(paths, StageName::Execute, dashboard)?;

    let launch = launch_request(paths, config, request.additional_dirs);
    let next_wave = plan.next_wave();
    let outcome = run_session(
        provider,
        paths,
        &launch,
        plan.prompt,
        config.poll_interval(),
        dashboard,
    )
    .await?;

    record_outcome(
        paths,
        "resume",
        &outcome,
        Some(format!("Resumed from wave {next_wave}")),
    )?;
    let committed = outcome.success && commit_progress(paths, RESUME_COMPLETE);
    Ok(StageReport { outcome, committed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checkpoint::wave_commit_subject;
    use crate::test_support::{TestRepo, touch_artifact};

    fn resume_error(err: &anyhow::Error) -> Option<&ResumeError> {
        err.downcast_ref::<ResumeError>()
    }

    #[test]
    fn split_must_exist() {
        let repo = TestRepo::new().expect("repo");
        let paths = ForgePaths::new(repo.path());
        repo.commit(&wave_commit_subject(1)).expect("commit");

        let err = plan_resume(&paths, "baseline").expect_err("no split");
        assert_eq!(resume_error(&err), Some(&ResumeError::SplitIncomplete));
    }

    #[test]
    fn checkpoint_must_exist() {
        let repo = TestRepo::new().expect("repo");
        let paths = ForgePaths::new(repo.path());
        touch_artifact(&paths, StageName::Split, None).expect("artifact");
        repo.commit("forge: split complete").expect("commit");

        let err = plan_resume(&paths, "baseline").expect_err("no checkpoint");
        assert_eq!(resume_error(&err), Some(&ResumeError::NoCheckpoint));
    }

    #[test]
    fn no_repository_means_no_checkpoint() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        touch_artifact(&paths, StageName::Split, None).expect("artifact");

        let err = plan_resume(&paths, "baseline").expect_err("no repo");
        assert_eq!(resume_error(&err), Some(&ResumeError::NoCheckpoint));
    }

    #[test]
    fn plan_appends_clause_for_latest_wave() {
        let repo = TestRepo::new().expect("repo");
        let paths = ForgePaths::new(repo.path());
        touch_artifact(&paths, StageName::Split, None).expect("artifact");
        repo.commit(&wave_commit_subject(1)).expect("commit");
        repo.commit(&wave_commit_subject(2)).expect("commit");

        let plan = plan_resume(&paths, "Execute the plan.").expect("plan");
        assert_eq!(plan.last_wave, 2);
        assert_eq!(plan.next_wave(), 3);
        assert!(plan.prompt.starts_with("Execute the plan."));
        assert!(plan.prompt.contains("RESUMING FROM WAVE 3"));
    }
}
