//! Test-only helpers: a scripted provider, a scratch git repository, and
//! artifact fixtures.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use tempfile::TempDir;

use crate::core::event::{ResultSummary, SessionEvent};
use crate::core::stage::StageName;
use crate::io::paths::ForgePaths;
use crate::io::provider::{EventStream, InputStream, LaunchRequest, Provider};

/// Create `stage`'s artifact, optionally with an explicit modification time.
pub fn touch_artifact(
    paths: &ForgePaths,
    stage: StageName,
    modified: Option<SystemTime>,
) -> Result<()> {
    let path = paths.artifact_path(stage);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
    if let Some(time) = modified {
        file.set_modified(time)
            .with_context(|| format!("set mtime on {}", path.display()))?;
    }
    Ok(())
}

/// Temporary directory initialised as a git repository with a committer identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo")?;
        git(dir.path(), &["init", "--quiet"])?;
        git(dir.path(), &["config", "user.email", "forge@example.com"])?;
        git(dir.path(), &["config", "user.name", "Forge Test"])?;
        git(dir.path(), &["config", "commit.gpgsign", "false"])?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit everything in the work tree with `message`, allowing empty commits.
    pub fn commit(&self, message: &str) -> Result<()> {
        git(self.path(), &["add", "-A"])?;
        git(self.path(), &["commit", "--quiet", "--allow-empty", "-m", message])
    }

    /// Subjects of every commit on HEAD, most recent first.
    pub fn subjects(&self) -> Result<Vec<String>> {
        let output = Command::new("git")
            .args(["log", "--format=%s"])
            .current_dir(self.path())
            .output()
            .context("spawn git log")?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !status.success() {
        return Err(anyhow!("git {} failed", args.join(" ")));
    }
    Ok(())
}

/// Provider that replays a fixed event script.
///
/// It first waits for `wait_for_turns` input turns (the prompt counts as one),
/// records them, then yields the script.
#[derive(Clone)]
pub struct ScriptedProvider {
    events: Vec<SessionEvent>,
    wait_for_turns: usize,
    received: Arc<Mutex<Vec<String>>>,
    launches: Arc<Mutex<Vec<LaunchRequest>>>,
}

impl ScriptedProvider {
    pub fn new(events: Vec<SessionEvent>) -> Self {
        Self {
            events,
            wait_for_turns: 1,
            received: Arc::default(),
            launches: Arc::default(),
        }
    }

    pub fn wait_for_turns(mut self, turns: usize) -> Self {
        self.wait_for_turns = turns;
        self
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().map(|turns| turns.clone()).unwrap_or_default()
    }

    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.launches.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Provider for ScriptedProvider {
    fn launch(&self, request: &LaunchRequest, mut input: InputStream) -> Result<EventStream> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(request.clone());
        }
        let events = self.events.clone();
        let wait_for = self.wait_for_turns;
        let received = Arc::clone(&self.received);

        Ok(Box::pin(async_stream::stream! {
            let mut seen = 0;
            while seen < wait_for {
                let Some(turn) = input.next().await else { break };
                if let Ok(mut turns) = received.lock() {
                    turns.push(turn);
                }
                seen += 1;
            }
            for event in events {
                yield Ok::<_, anyhow::Error>(event);
            }
        }))
    }
}

/// Minimal successful session: init, then a result with the given cost.
pub fn success_script(session_id: &str, cost: f64) -> Vec<SessionEvent> {
    vec![
        SessionEvent::System {
            subtype: "init".to_string(),
            session_id: Some(session_id.to_string()),
        },
        SessionEvent::Result(ResultSummary {
            subtype: "success".to_string(),
            session_id: Some(session_id.to_string()),
            total_cost_usd: cost,
            duration_ms: Some(1_000),
            result: Some("done".to_string()),
            errors: Vec::new(),
        }),
    ]
}
