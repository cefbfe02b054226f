//! Pipeline state and live steering for agent-team code generation runs.
//!
//! A project moves through five stages (inspect, design, plan, split,
//! execute); each stage is complete when its artifact exists. The execute
//! stage runs one long streaming session that can be steered from outside
//! through a file-backed mailbox and resumed from git wave checkpoints.
//!
//! - **[`core`]**: Pure, deterministic logic (stage order, staleness, checkpoint
//!   parsing, event classification, participant tracking). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem layout, git, mailbox,
//!   provider process, run log, config).
//!
//! Orchestration modules ([`session`], [`resume`], [`steer`], [`status`],
//! [`watch`]) coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod dashboard;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod resume;
pub mod session;
pub mod status;
pub mod steer;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
