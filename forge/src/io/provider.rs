//! Execution provider abstraction.
//!
//! The [`Provider`] trait decouples session orchestration from the agent
//! backend (currently the `claude` CLI in stream-json mode). Tests use a
//! scripted provider that replays predetermined events without spawning
//! processes.

use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, instrument, warn};

use crate::core::event::SessionEvent;
use crate::io::config::ProviderConfig;

/// The session's single logical input: the prompt, then any injected turns.
pub type InputStream = Pin<Box<dyn Stream<Item = String> + Send>>;
/// Provider events in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SessionEvent>> + Send>>;

/// Parameters for one provider session.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Working directory for the session (the project root).
    pub workdir: PathBuf,
    /// Extra directories the session may read, e.g. the reference codebase.
    pub additional_dirs: Vec<PathBuf>,
    pub model: Option<String>,
    pub permission_mode: String,
    pub max_budget_usd: Option<f64>,
}

impl LaunchRequest {
    pub fn from_config(workdir: impl Into<PathBuf>, provider: &ProviderConfig) -> Self {
        Self {
            workdir: workdir.into(),
            additional_dirs: Vec::new(),
            model: provider.model.clone(),
            permission_mode: provider.permission_mode.clone(),
            max_budget_usd: provider.max_budget_usd,
        }
    }
}

/// Abstraction over agent execution backends.
pub trait Provider {
    /// Start a session that reads turns from `input` until it ends and
    /// reports what happens as an event stream.
    fn launch(&self, request: &LaunchRequest, input: InputStream) -> Result<EventStream>;
}

/// Provider that spawns the `claude` CLI with stream-json input and output.
pub struct ClaudeProvider {
    command: Vec<String>,
}

impl ClaudeProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            command: config.command.clone(),
        }
    }
}

impl Provider for ClaudeProvider {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    fn launch(&self, request: &LaunchRequest, input: InputStream) -> Result<EventStream> {
        let (program, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("provider command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(base_args)
            .arg("--print")
            .arg("--verbose")
            .arg("--input-format")
            .arg("stream-json")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--permission-mode")
            .arg(&request.permission_mode);
        if let Some(model) = &request.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(budget) = request.max_budget_usd {
            cmd.arg("--max-budget-usd").arg(budget.to_string());
        }
        for dir in &request.additional_dirs {
            cmd.arg("--add-dir").arg(dir);
        }
        cmd.current_dir(&request.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        info!(program = %program, "starting provider session");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn provider {program}"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;

        tokio::spawn(async move {
            if let Err(err) = write_turns(stdin, input).await {
                warn!(err = %err, "provider input writer stopped");
            }
        });

        let events = async_stream::stream! {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match SessionEvent::parse_line(&line) {
                        Some(event) => yield Ok(event),
                        None => debug!(line = %line, "skipping undecodable provider line"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(anyhow::Error::new(err).context("read provider output"));
                        break;
                    }
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => debug!("provider exited"),
                Ok(status) => warn!(exit_code = ?status.code(), "provider exited with failure"),
                Err(err) => warn!(err = %err, "could not reap provider"),
            }
        };
        Ok(Box::pin(events))
    }
}

/// Encode one input turn as a stream-json user message line.
pub fn user_turn_line(turn: &str) -> Result<String> {
    let value = serde_json::json!({
        "type": "user",
        "message": { "role": "user", "content": turn },
    });
    let mut line = serde_json::to_string(&value).context("serialize input turn")?;
    line.push('\n');
    Ok(line)
}

/// Forward turns to the provider's stdin; closing stdin ends the session.
async fn write_turns(mut stdin: ChildStdin, mut input: InputStream) -> Result<()> {
    while let Some(turn) = input.next().await {
        let line = user_turn_line(&turn)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .context("write provider input")?;
        stdin.flush().await.context("flush provider input")?;
        debug!(bytes = line.len(), "sent input turn");
    }
    stdin.shutdown().await.context("close provider input")?;
    Ok(())
}
