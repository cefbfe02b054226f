//! Orchestration for one streaming session and the execute stage built on it.
//!
//! A session owns exactly one provider conversation, one steering channel and
//! one dashboard. Provider events are consumed strictly in arrival order; the
//! channel is the only concurrent producer and feeds the same input stream as
//! the initial prompt.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::event::{ResultSummary, SessionEvent};
use crate::core::stage::StageName;
use crate::dashboard::Dashboard;
use crate::io::channel::{ChannelReport, SteeringChannel};
use crate::io::config::ForgeConfig;
use crate::io::git::Git;
use crate::io::ledger::staleness;
use crate::io::paths::ForgePaths;
use crate::io::provider::{InputStream, LaunchRequest, Provider};
use crate::io::run_log::{LogEntry, append_entry};

pub const EXECUTE_COMPLETE: &str = "forge: execute complete";
pub const EXECUTE_FAILED: &str = "forge: execute partial (failed)";

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Provider session id from the start signal, when one was reported.
    pub session_id: Option<String>,
    pub success: bool,
    pub cost_usd: f64,
    /// Wall time measured locally, from channel open to teardown.
    pub duration: Duration,
    pub result: Option<String>,
    pub errors: Vec<String>,
    pub channel: ChannelReport,
}

/// Caller-provided input for a stage run.
#[derive(Debug, Clone)]
pub struct StageRequest {
    /// Baseline instruction payload for the stage.
    pub prompt: String,
    pub additional_dirs: Vec<PathBuf>,
}

/// A finished stage: the session outcome and whether progress was committed.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub outcome: SessionOutcome,
    pub committed: bool,
}

/// Run one session with live steering.
///
/// The sentinel exists for exactly as long as this call runs: it is created
/// before the provider launches and is gone when this returns, on success and
/// on error alike.
#[instrument(skip_all, fields(workdir = %launch.workdir.display()))]
pub async fn run_session<P: Provider, W: Write>(
    provider: &P,
    paths: &ForgePaths,
    launch: &LaunchRequest,
    prompt: String,
    poll_interval: Duration,
    dashboard: &mut Dashboard<W>,
) -> Result<SessionOutcome> {
    let started = Instant::now();
    let (channel, mut turns) = SteeringChannel::open(paths, poll_interval)?;
    let cancel = CancellationToken::new();
    let channel_task = tokio::spawn(channel.run(cancel.clone()));

    let input: InputStream = Box::pin(async_stream::stream! {
        yield prompt;
        while let Some(turn) = turns.recv().await {
            yield turn;
        }
    });

    let consumed = consume_events(provider, launch, input, dashboard, &cancel).await;
    cancel.cancel();
    let channel_report = channel_task
        .await
        .context("join steering channel")?
        .context("steering channel")?;
    if let Err(err) = dashboard.cleanup() {
        debug!(err = %err, "dashboard cleanup failed");
    }

    let (session_id, result) = consumed?;
    let outcome = match result {
        Some(summary) => SessionOutcome {
            session_id: session_id.or(summary.session_id.clone()),
            success: summary.is_success(),
            cost_usd: summary.total_cost_usd,
            duration: started.elapsed(),
            result: summary.result,
            errors: summary.errors,
            channel: channel_report,
        },
        None => SessionOutcome {
            session_id,
            success: false,
            cost_usd: 0.0,
            duration: started.elapsed(),
            result: None,
            errors: vec!["session ended without a result".to_string()],
            channel: channel_report,
        },
    };
    info!(
        success = outcome.success,
        cost_usd = outcome.cost_usd,
        relayed = outcome.channel.relayed,
        unread = outcome.channel.unread,
        abandoned = outcome.channel.abandoned,
        "session finished"
    );
    Ok(outcome)
}

/// Feed provider events to the dashboard until the stream ends.
///
/// The terminal result cancels the channel right away so the input stream
/// closes and the provider can exit.
async fn consume_events<P: Provider, W: Write>(
    provider: &P,
    launch: &LaunchRequest,
    input: InputStream,
    dashboard: &mut Dashboard<W>,
    cancel: &CancellationToken,
) -> Result<(Option<String>, Option<ResultSummary>)> {
    let mut events = provider.launch(launch, input)?;
    let mut session_id = None;
    let mut result = None;

    while let Some(event) = events.next().await {
        let event = event?;
        if event.is_init()
            && let SessionEvent::System {
                session_id: Some(id),
                ..
            } = &event
        {
            debug!(session_id = %id, "session started");
            session_id = Some(id.clone());
        }
        if let Err(err) = dashboard.on_event(&event) {
            warn!(err = %err, "dashboard write failed");
        }
        if let SessionEvent::Result(summary) = event {
            cancel.cancel();
            result = Some(summary);
        }
    }
    Ok((session_id, result))
}

/// Launch parameters for a stage run in this project.
pub fn launch_request(
    paths: &ForgePaths,
    config: &ForgeConfig,
    additional_dirs: Vec<PathBuf>,
) -> LaunchRequest {
    LaunchRequest {
        additional_dirs,
        ..LaunchRequest::from_config(paths.root(), &config.provider)
    }
}

/// Fresh execute run.
pub async fn run_execute<P: Provider, W: Write>(
    provider: &P,
    paths: &ForgePaths,
    config: &ForgeConfig,
    request: StageRequest,
    dashboard: &mut Dashboard<W>,
) -> Result<StageReport> {
    if !paths.artifact_path(StageName::Split).exists() {
        bail!("split stage not complete (run `forge split` first)");
    }
    warn_stale(paths, StageName::Execute, dashboard)?;

    let launch = launch_request(paths, config, request.additional_dirs);
    let outcome = run_session(
        provider,
        paths,
        &launch,
        request.prompt,
        config.poll_interval(),
        dashboard,
    )
    .await?;

    record_outcome(paths, "execute", &outcome, None)?;
    let message = if outcome.success {
        EXECUTE_COMPLETE
    } else {
        EXECUTE_FAILED
    };
    let committed = commit_progress(paths, message);
    Ok(StageReport { outcome, committed })
}

/// Print staleness warnings that name `stage`.
pub(crate) fn warn_stale<W: Write>(
    paths: &ForgePaths,
    stage: StageName,
    dashboard: &mut Dashboard<W>,
) -> Result<()> {
    for warning in staleness(paths).into_iter().filter(|w| w.stage == stage) {
        dashboard.notice(&format!("⚠ {}", warning.reason))?;
    }
    Ok(())
}

pub(crate) fn record_outcome(
    paths: &ForgePaths,
    action: &str,
    outcome: &SessionOutcome,
    details: Option<String>,
) -> Result<()> {
    let status = if outcome.success { "success" } else { "failed" };
    let mut entry = LogEntry::now(action, status)
        .with_duration(outcome.duration)
        .with_cost(outcome.cost_usd);
    let details =
        details.or_else(|| (!outcome.errors.is_empty()).then(|| outcome.errors.join("; ")));
    if let Some(details) = details {
        entry = entry.with_details(details);
    }
    append_entry(&paths.log_path, &entry)
}

/// Commit the work tree. Failures are logged; "nothing to commit" is not one.
pub(crate) fn commit_progress(paths: &ForgePaths, message: &str) -> bool {
    match Git::new(paths.root()).commit_all(message) {
        Ok(committed) => {
            debug!(committed, message, "stage commit");
            committed
        }
        Err(err) => {
            warn!(err = %err, "could not commit progress");
            false
        }
    }
}
