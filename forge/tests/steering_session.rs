//! End-to-end execute runs against a scripted provider.
//!
//! These drive `run_execute` with a real git repository and a real mailbox,
//! so the steering channel, dashboard, run log and stage commit are all
//! exercised together.

use std::fs;
use std::path::PathBuf;

use serde_json::json;

use forge::core::event::{ContentBlock, ResultSummary, SessionEvent};
use forge::core::stage::StageName;
use forge::dashboard::Dashboard;
use forge::io::config::ForgeConfig;
use forge::io::mailbox::{self, is_active};
use forge::io::paths::ForgePaths;
use forge::io::run_log::read_recent;
use forge::session::{EXECUTE_COMPLETE, EXECUTE_FAILED, StageRequest, run_execute};
use forge::test_support::{ScriptedProvider, TestRepo, touch_artifact};

fn ready_project() -> (TestRepo, ForgePaths) {
    let repo = TestRepo::new().expect("repo");
    let paths = ForgePaths::new(repo.path());
    for stage in [StageName::Inspect, StageName::Design, StageName::Plan, StageName::Split] {
        touch_artifact(&paths, stage, None).expect("artifact");
    }
    repo.commit("forge: split complete").expect("commit");
    (repo, paths)
}

fn config() -> ForgeConfig {
    ForgeConfig {
        poll_interval_ms: 20,
        ..ForgeConfig::default()
    }
}

fn request() -> StageRequest {
    StageRequest {
        prompt: "Execute the track plan.".to_string(),
        additional_dirs: Vec::new(),
    }
}

fn team_script(subtype: &str) -> Vec<SessionEvent> {
    vec![
        SessionEvent::System {
            subtype: "init".to_string(),
            session_id: Some("sess-7".to_string()),
        },
        SessionEvent::Assistant {
            parent_tool_use_id: None,
            blocks: vec![
                ContentBlock::Text("Starting wave 1 with the backend track.".to_string()),
                ContentBlock::ToolUse {
                    id: Some("tu-1".to_string()),
                    name: "Task".to_string(),
                    input: json!({ "name": "backend", "prompt": "build the db layer" }),
                },
            ],
        },
        SessionEvent::Assistant {
            parent_tool_use_id: Some("tu-1".to_string()),
            blocks: vec![ContentBlock::ToolUse {
                id: Some("tu-2".to_string()),
                name: "Write".to_string(),
                input: json!({ "file_path": "src/db.rs" }),
            }],
        },
        SessionEvent::Assistant {
            parent_tool_use_id: Some("tu-1".to_string()),
            blocks: vec![ContentBlock::ToolUse {
                id: Some("tu-3".to_string()),
                name: "TodoWrite".to_string(),
                input: json!({ "todos": [] }),
            }],
        },
        SessionEvent::User {
            parent_tool_use_id: Some("tu-1".to_string()),
            has_tool_result: true,
        },
        SessionEvent::User {
            parent_tool_use_id: Some("tu-1".to_string()),
            has_tool_result: true,
        },
        SessionEvent::Unknown,
        SessionEvent::Result(ResultSummary {
            subtype: subtype.to_string(),
            session_id: Some("sess-7".to_string()),
            total_cost_usd: 3.25,
            duration_ms: Some(90_000),
            result: None,
            errors: if subtype == "success" {
                Vec::new()
            } else {
                vec!["budget exceeded".to_string()]
            },
        }),
    ]
}

#[tokio::test]
async fn steered_team_run_completes_and_commits() {
    let (repo, paths) = ready_project();
    mailbox::write(&paths, "backend", "use postgres, not sqlite").expect("inform");
    let provider = ScriptedProvider::new(team_script("success")).wait_for_turns(2);
    let mut dashboard = Dashboard::new("execute", Vec::new(), false);
    fs::write(repo.path().join("db.rs"), "// generated\n").expect("work");

    let report = run_execute(&provider, &paths, &config(), request(), &mut dashboard)
        .await
        .expect("execute");

    let outcome = &report.outcome;
    assert!(outcome.success);
    assert_eq!(outcome.session_id.as_deref(), Some("sess-7"));
    assert_eq!(outcome.channel.relayed, 1);
    assert!(!is_active(&paths));

    let received = provider.received();
    assert_eq!(received[0], "Execute the track plan.");
    assert!(received[1].contains("relay this to the \"backend\" teammate"));
    assert!(received[1].ends_with("use postgres, not sqlite"));

    let out = String::from_utf8(dashboard.into_inner()).expect("utf8");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "  [Lead] Session started (execute)");
    assert!(out.contains("  [Lead] Starting wave 1 with the backend track."));
    assert!(out.contains("  [Lead] Spawning teammate: backend"));
    assert!(out.contains("  [backend] Writing src/db.rs"));
    assert!(!out.contains("TodoWrite"));
    assert_eq!(out.matches("Done ✓").count(), 1);
    assert!(out.contains("Agent Team (1 teammate):"));
    assert!(out.contains(&format!("    - {:<24} {:<8}", "backend", "done")));

    assert!(report.committed);
    assert_eq!(repo.subjects().expect("log")[0], EXECUTE_COMPLETE);
    let log = read_recent(&paths.log_path, 5).expect("run log");
    assert_eq!(log.last().map(|e| e.status.as_str()), Some("success"));
}

#[tokio::test]
async fn failed_run_commits_partial_progress() {
    let (repo, paths) = ready_project();
    let provider = ScriptedProvider::new(team_script("error_max_budget_usd"));
    let mut dashboard = Dashboard::new("execute", Vec::new(), false);
    fs::write(repo.path().join("half.rs"), "// partial\n").expect("work");

    let report = run_execute(&provider, &paths, &config(), request(), &mut dashboard)
        .await
        .expect("execute");

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.errors, vec!["budget exceeded".to_string()]);
    assert_eq!(repo.subjects().expect("log")[0], EXECUTE_FAILED);
    let log = read_recent(&paths.log_path, 5).expect("run log");
    assert_eq!(log[0].status, "failed");
    assert_eq!(log[0].details.as_deref(), Some("budget exceeded"));
    assert!(!is_active(&paths));
}

#[tokio::test]
async fn stale_split_is_reported_before_the_run() {
    let (_repo, paths) = ready_project();
    touch_artifact(
        &paths,
        StageName::Execute,
        Some(std::time::SystemTime::now() - std::time::Duration::from_secs(3_600)),
    )
    .expect("old execute artifact");
    let provider = ScriptedProvider::new(team_script("success"));
    let mut dashboard = Dashboard::new("execute", Vec::new(), false);

    run_execute(&provider, &paths, &config(), request(), &mut dashboard)
        .await
        .expect("execute");

    let out = String::from_utf8(dashboard.into_inner()).expect("utf8");
    assert!(out.starts_with("  ⚠ split was modified after execute was generated\n"));
    assert_eq!(provider.launches()[0].workdir, PathBuf::from(paths.root()));
}
