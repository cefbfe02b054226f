//! Ledger and staleness scenarios over real artifact files.

use std::time::{Duration, SystemTime};

use forge::core::stage::{PipelinePosition, StageName};
use forge::io::ledger::{current_stage, stage_statuses, staleness};
use forge::io::paths::ForgePaths;
use forge::test_support::touch_artifact;

/// Stages 1-3 exist and plan (stage 3) predates design (stage 2).
#[test]
fn older_plan_than_design_points_at_split_with_one_warning() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = ForgePaths::new(temp.path());
    let base = SystemTime::now() - Duration::from_secs(7_200);
    touch_artifact(&paths, StageName::Inspect, Some(base)).expect("inspect");
    touch_artifact(&paths, StageName::Design, Some(base + Duration::from_secs(600)))
        .expect("design");
    touch_artifact(&paths, StageName::Plan, Some(base + Duration::from_secs(300)))
        .expect("plan");

    assert_eq!(current_stage(&paths), PipelinePosition::Next(StageName::Split));
    let warnings = staleness(&paths);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, StageName::Plan);
}

#[test]
fn gaps_do_not_pull_position_back() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = ForgePaths::new(temp.path());
    touch_artifact(&paths, StageName::Inspect, None).expect("inspect");
    touch_artifact(&paths, StageName::Plan, None).expect("plan");

    assert_eq!(current_stage(&paths), PipelinePosition::Next(StageName::Split));
    assert!(staleness(&paths).is_empty());
}

#[test]
fn missing_middle_stage_suppresses_comparison() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = ForgePaths::new(temp.path());
    let base = SystemTime::now() - Duration::from_secs(7_200);
    // inspect is newer than plan, but they are not neighbours.
    touch_artifact(&paths, StageName::Inspect, Some(base + Duration::from_secs(500)))
        .expect("inspect");
    touch_artifact(&paths, StageName::Plan, Some(base + Duration::from_secs(100)))
        .expect("plan");
    touch_artifact(&paths, StageName::Split, Some(base)).expect("split");

    let warnings = staleness(&paths);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, StageName::Split);
}

#[test]
fn custom_state_dir_is_respected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = ForgePaths::with_state_dir(temp.path(), ".proteus");
    touch_artifact(&paths, StageName::Inspect, None).expect("inspect");

    assert!(temp.path().join(".proteus/01-inspect/features.json").exists());
    let statuses = stage_statuses(&paths);
    assert!(statuses[0].complete);
    assert!(!ForgePaths::new(temp.path()).artifact_path(StageName::Inspect).exists());
}
