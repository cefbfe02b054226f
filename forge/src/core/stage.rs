//! Pipeline stage ordering, position and staleness over collected statuses.
//!
//! Everything here works on [`StageStatus`] values that the ledger already
//! gathered from disk, so the rules stay pure and testable without a
//! filesystem.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// One of the five fixed pipeline stages, declared in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Inspect,
    Design,
    Plan,
    Split,
    Execute,
}

/// The fixed stage order. Index `i` always precedes index `i + 1`.
pub const STAGE_ORDER: [StageName; 5] = [
    StageName::Inspect,
    StageName::Design,
    StageName::Plan,
    StageName::Split,
    StageName::Execute,
];

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Inspect => "inspect",
            StageName::Design => "design",
            StageName::Plan => "plan",
            StageName::Split => "split",
            StageName::Execute => "execute",
        }
    }

    /// Artifact path relative to the state directory. Its existence is the
    /// only completeness signal for the stage.
    pub fn artifact_rel_path(self) -> &'static str {
        match self {
            StageName::Inspect => "01-inspect/features.json",
            StageName::Design => "02-design/design.md",
            StageName::Plan => "03-plan/plan.json",
            StageName::Split => "04-tracks/manifest.json",
            StageName::Execute => "05-execute/session.json",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stage that follows this one, or `None` for the final stage.
    pub fn next(self) -> Option<StageName> {
        STAGE_ORDER.get(self.index() + 1).copied()
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived completeness of one stage. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: StageName,
    pub complete: bool,
    pub artifact_path: PathBuf,
    /// Artifact modification time; only populated for complete stages.
    pub modified_at: Option<SystemTime>,
}

/// Where a project sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePosition {
    /// No stage is complete.
    New,
    /// The stage after the last complete one (in pipeline order).
    Next(StageName),
    /// The final stage is the last complete one.
    Done,
}

impl PipelinePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePosition::New => "new",
            PipelinePosition::Next(stage) => stage.as_str(),
            PipelinePosition::Done => "done",
        }
    }
}

impl fmt::Display for PipelinePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downstream stage whose artifact predates its upstream neighbour's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessWarning {
    pub stage: StageName,
    pub reason: String,
}

/// Position after the last complete stage in pipeline order.
///
/// Gaps are not filled in: with inspect and plan complete but design missing,
/// the last complete stage is plan and the position is `Next(Split)`.
pub fn position_of(statuses: &[StageStatus]) -> PipelinePosition {
    let Some(last) = statuses
        .iter()
        .filter(|status| status.complete)
        .map(|status| status.stage)
        .max()
    else {
        return PipelinePosition::New;
    };
    match last.next() {
        Some(next) => PipelinePosition::Next(next),
        None => PipelinePosition::Done,
    }
}

/// Compare each adjacent pair of stages and flag the downstream one when the
/// upstream artifact is strictly newer.
///
/// Only neighbours are compared. A pair where either side is incomplete or
/// lacks a timestamp yields nothing.
pub fn stale_stages(statuses: &[StageStatus]) -> Vec<StalenessWarning> {
    statuses
        .windows(2)
        .filter_map(|pair| {
            let (upstream, downstream) = (&pair[0], &pair[1]);
            if !upstream.complete || !downstream.complete {
                return None;
            }
            let (up_time, down_time) = (upstream.modified_at?, downstream.modified_at?);
            (up_time > down_time).then(|| StalenessWarning {
                stage: downstream.stage,
                reason: format!(
                    "{} was modified after {} was generated",
                    upstream.stage, downstream.stage
                ),
            })
        })
        .collect()
}
