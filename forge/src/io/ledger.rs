//! Stage ledger: pipeline position derived purely from artifact presence.

use std::fs;

use tracing::{debug, warn};

use crate::core::stage::{
    PipelinePosition, STAGE_ORDER, StageName, StageStatus, StalenessWarning, position_of,
    stale_stages,
};
use crate::io::paths::ForgePaths;

/// The five stage names in pipeline order.
pub fn stage_order() -> &'static [StageName] {
    &STAGE_ORDER
}

/// Check every stage's artifact. A stage is complete iff its artifact exists.
pub fn stage_statuses(paths: &ForgePaths) -> Vec<StageStatus> {
    STAGE_ORDER
        .iter()
        .map(|&stage| {
            let artifact_path = paths.artifact_path(stage);
            let complete = artifact_path.exists();
            let modified_at = if complete {
                match fs::metadata(&artifact_path).and_then(|m| m.modified()) {
                    Ok(time) => Some(time),
                    Err(err) => {
                        warn!(stage = %stage, err = %err, "artifact mtime unavailable");
                        None
                    }
                }
            } else {
                None
            };
            StageStatus {
                stage,
                complete,
                artifact_path,
                modified_at,
            }
        })
        .collect()
}

pub fn current_stage(paths: &ForgePaths) -> PipelinePosition {
    let position = position_of(&stage_statuses(paths));
    debug!(position = %position, "current stage");
    position
}

pub fn staleness(paths: &ForgePaths) -> Vec<StalenessWarning> {
    stale_stages(&stage_statuses(paths))
}
