//! Instruction text injected by forge itself.
//!
//! The baseline stage prompts come from outside; forge only renders the
//! pieces it owns: the resumption clause, relayed steering turns, and the abort
//! notice.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};

use crate::io::mailbox::MailboxMessage;

const RESUME_TEMPLATE: &str = include_str!("prompts/resume.md");
const RELAY_TEMPLATE: &str = include_str!("prompts/relay.md");

/// Shutdown instruction queued for the lead by `forge abort`.
pub const ABORT_MESSAGE: &str = include_str!("prompts/abort.md");

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(PromptEngine::new);

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("resume", RESUME_TEMPLATE)
            .expect("resume template should be valid");
        env.add_template("relay", RELAY_TEMPLATE)
            .expect("relay template should be valid");
        Self { env }
    }
}

/// Append the resumption clause for `last_wave` to the baseline prompt.
pub fn resume_prompt(baseline: &str, last_wave: u32) -> Result<String> {
    let clause = ENGINE.env.get_template("resume")?.render(context! {
        last_wave => last_wave,
        next_wave => last_wave + 1,
    })?;
    Ok(format!("{}\n\n{}", baseline.trim_end(), clause.trim_end()))
}

/// Injected input turn that asks the lead to relay `message` right away.
pub fn relay_turn(message: &MailboxMessage) -> Result<String> {
    let turn = ENGINE.env.get_template("relay")?.render(context! {
        target => message.target_agent.as_str(),
        message => message.message.trim(),
    })?;
    Ok(turn.trim_end().to_string())
}

/// The abort notice without the template's trailing newline.
pub fn abort_message() -> &'static str {
    ABORT_MESSAGE.trim_end()
}
