//! `forge status`: stage table, pipeline position, staleness.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::core::stage::{
    PipelinePosition, StageStatus, StalenessWarning, position_of, stale_stages,
};
use crate::io::ledger::stage_statuses;
use crate::io::mailbox::is_active;
use crate::io::paths::ForgePaths;

/// Snapshot of the pipeline on disk.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub stages: Vec<StageStatus>,
    pub position: PipelinePosition,
    pub warnings: Vec<StalenessWarning>,
    pub session_active: bool,
}

pub fn collect(paths: &ForgePaths) -> StatusReport {
    let stages = stage_statuses(paths);
    StatusReport {
        position: position_of(&stages),
        warnings: stale_stages(&stages),
        session_active: is_active(paths),
        stages,
    }
}

pub fn render<W: Write>(report: &StatusReport, out: &mut W) -> Result<()> {
    for status in &report.stages {
        let mark = if status.complete { "✓" } else { "·" };
        let modified = status
            .modified_at
            .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        writeln!(out, "  {mark} {:<8} {modified}", status.stage.as_str())
            .context("write status row")?;
    }
    writeln!(out).context("write status")?;
    writeln!(out, "  Current stage: {}", report.position).context("write status")?;
    if report.session_active {
        writeln!(out, "  Execute session: active").context("write status")?;
    }
    for warning in &report.warnings {
        writeln!(out, "  ⚠ {}", warning.reason).context("write status")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::StageName;
    use crate::test_support::touch_artifact;
    use std::time::{Duration, SystemTime};

    fn rendered(paths: &ForgePaths) -> String {
        let mut out = Vec::new();
        render(&collect(paths), &mut out).expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn new_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        let out = rendered(&paths);
        assert!(out.contains("  · inspect"));
        assert!(out.contains("Current stage: new"));
        assert!(!out.contains('⚠'));
    }

    #[test]
    fn stale_downstream_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ForgePaths::new(temp.path());
        let base = SystemTime::now() - Duration::from_secs(3600);
        touch_artifact(&paths, StageName::Inspect, Some(base)).expect("inspect");
        touch_artifact(&paths, StageName::Design, Some(base + Duration::from_secs(60)))
            .expect("design");
        touch_artifact(&paths, StageName::Plan, Some(base + Duration::from_secs(30)))
            .expect("plan");

        let report = collect(&paths);
        assert_eq!(report.position, PipelinePosition::Next(StageName::Split));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].stage, StageName::Plan);

        let out = rendered(&paths);
        assert!(out.contains("  ✓ design"));
        assert!(out.contains("Current stage: split"));
        assert!(out.contains("⚠ design was modified after plan was generated"));
    }
}
