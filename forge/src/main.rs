//! Pipeline state and live steering for agent-team code generation runs.
//!
//! Reports where a project sits in the five-stage pipeline, runs and resumes
//! the execute stage, and steers a running execute session through a
//! file-backed mailbox.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use forge::dashboard::{ColorMode, Dashboard};
use forge::exit_codes::{INVALID, NO_SESSION, NOT_RESUMABLE, OK, SESSION_FAILED};
use forge::io::config::{ForgeConfig, load_config};
use forge::io::paths::ForgePaths;
use forge::io::provider::ClaudeProvider;
use forge::io::run_log::format_duration;
use forge::logging;
use forge::resume::{ResumeError, run_resume};
use forge::session::{StageReport, StageRequest, run_execute};
use forge::steer::{self, SteerError};
use forge::status;
use forge::watch::{self, WatchOptions};

#[derive(Parser)]
#[command(
    name = "forge",
    version,
    about = "Pipeline state and live steering for agent-team code generation"
)]
struct Cli {
    /// Project root containing the state directory.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file [default: <root>/.forge/config.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// When to colour dashboard output.
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show stage completion, the current stage, and staleness warnings.
    Status,
    /// Send a message to a teammate in the running execute session.
    Inform {
        /// Teammate name, or `lead`.
        agent: String,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Ask the running execute session to shut down and commit partial work.
    Abort,
    /// Run the execute stage.
    Execute(StageArgs),
    /// Resume the execute stage after the last completed wave.
    Resume(StageArgs),
    /// Follow the run log while an execute session is active.
    Watch,
}

#[derive(clap::Args)]
struct StageArgs {
    /// File holding the baseline execute prompt.
    #[arg(long)]
    prompt: PathBuf,
    /// Extra directory the session may read (repeatable).
    #[arg(long = "add-dir")]
    add_dirs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<SteerError>().is_some() {
        NO_SESSION
    } else if err.downcast_ref::<ResumeError>().is_some() {
        NOT_RESUMABLE
    } else {
        INVALID
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let paths = ForgePaths::new(&cli.root);
    match cli.command {
        Command::Status => {
            let report = status::collect(&paths);
            status::render(&report, &mut io::stdout().lock())?;
            Ok(OK)
        }
        Command::Inform { agent, message } => {
            steer::inform(&paths, &agent, &message.join(" "))?;
            println!("Message queued for {agent}. It will be relayed on the next poll.");
            Ok(OK)
        }
        Command::Abort => {
            let report = steer::abort(&paths)?;
            println!("Abort requested; the lead has been asked to shut down the team.");
            if report.committed {
                println!("Partial progress committed.");
            }
            Ok(OK)
        }
        Command::Execute(args) => {
            let config = load_stage_config(cli.config, &paths)?;
            let provider = ClaudeProvider::new(&config.provider);
            let mut dashboard = Dashboard::stdout("execute", cli.color);
            let request = stage_request(args)?;
            let report = run_execute(&provider, &paths, &config, request, &mut dashboard).await?;
            Ok(finish("Execute", &report))
        }
        Command::Resume(args) => {
            let config = load_stage_config(cli.config, &paths)?;
            let provider = ClaudeProvider::new(&config.provider);
            let mut dashboard = Dashboard::stdout("execute", cli.color);
            let request = stage_request(args)?;
            let report = run_resume(&provider, &paths, &config, request, &mut dashboard).await?;
            Ok(finish("Resume", &report))
        }
        Command::Watch => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            watch::watch(&paths, WatchOptions::default(), &mut io::stdout(), cancel).await?;
            Ok(OK)
        }
    }
}

fn load_stage_config(explicit: Option<PathBuf>, paths: &ForgePaths) -> Result<ForgeConfig> {
    let path = explicit.unwrap_or_else(|| paths.config_path.clone());
    load_config(&path)
}

fn stage_request(args: StageArgs) -> Result<StageRequest> {
    let prompt = fs::read_to_string(&args.prompt)
        .with_context(|| format!("read prompt {}", args.prompt.display()))?;
    Ok(StageRequest {
        prompt,
        additional_dirs: args.add_dirs,
    })
}

fn finish(label: &str, report: &StageReport) -> i32 {
    let outcome = &report.outcome;
    println!(
        "\n  {label} {} (cost ${:.2}, {})",
        if outcome.success { "complete" } else { "failed" },
        outcome.cost_usd,
        format_duration(outcome.duration)
    );
    for error in &outcome.errors {
        println!("  - {error}");
    }
    if report.committed {
        println!("  Progress committed.");
    }
    if outcome.success { OK } else { SESSION_FAILED }
}
