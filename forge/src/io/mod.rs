//! I/O helpers for forge commands.

pub mod channel;
pub mod config;
pub mod git;
pub mod ledger;
pub mod mailbox;
pub mod paths;
pub mod prompt;
pub mod provider;
pub mod run_log;
