//! Short human-readable descriptions of tool calls and assistant text.
//!
//! Tool descriptions and text summaries use different budgets: a tool line is
//! a glance at what is happening, a text line may carry a full sentence.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Maximum characters in a tool-call description line.
pub const TOOL_LINE_MAX: usize = 70;
/// Maximum characters in an assistant text summary.
pub const TEXT_LINE_MAX: usize = 180;

/// Tools that spawn a new participant.
pub const SPAWN_TOOLS: &[&str] = &["Task", "Agent"];

/// Task-list bookkeeping and inter-agent plumbing; never shown.
pub const COORDINATION_TOOLS: &[&str] = &[
    "TodoWrite",
    "TaskCreate",
    "TaskUpdate",
    "TaskList",
    "TaskGet",
    "TaskOutput",
    "SendMessage",
    "TeamCreate",
    "TeamDelete",
];

static NARRATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:now,?\s+|next,?\s+)?",
        r"(?:i\s*(?:will|'ll|’ll|am going to|'m going to)|let\s+me)",
        r"\s+(?:now\s+)?(?:call|use|invoke|run)\b",
    ))
    .expect("narration pattern should be valid")
});

pub fn is_spawn_tool(name: &str) -> bool {
    SPAWN_TOOLS.contains(&name)
}

pub fn is_coordination_tool(name: &str) -> bool {
    COORDINATION_TOOLS.contains(&name)
}

/// Truncate to `max` characters, replacing the tail with `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Describe a tool call for display, or `None` for coordination tools.
pub fn describe_tool(name: &str, input: &Value) -> Option<String> {
    if is_coordination_tool(name) {
        return None;
    }
    let field = |key: &str| input.get(key).and_then(Value::as_str).map(str::trim);
    let described = match name {
        "Read" => field("file_path").map(|p| format!("Reading {p}")),
        "Write" => field("file_path").map(|p| format!("Writing {p}")),
        "Edit" | "MultiEdit" => field("file_path").map(|p| format!("Editing {p}")),
        "NotebookEdit" => field("notebook_path").map(|p| format!("Editing {p}")),
        "Bash" => field("command")
            .and_then(|c| c.lines().next())
            .map(|c| format!("Running: {c}")),
        "Grep" => field("pattern").map(|p| format!("Searching: {p}")),
        "Glob" => field("pattern").map(|p| format!("Finding: {p}")),
        "WebFetch" => field("url").map(|u| format!("Fetching {u}")),
        "WebSearch" => field("query").map(|q| format!("Searching web: {q}")),
        _ => None,
    };
    Some(truncate_chars(
        &described.unwrap_or_else(|| name.to_string()),
        TOOL_LINE_MAX,
    ))
}

/// True for text like "I'll now use the Read tool" that only narrates the
/// next tool call.
pub fn is_narration(text: &str) -> bool {
    NARRATION_RE.is_match(text.trim_start())
}

/// Summarize assistant text for a single display line.
///
/// Prefers the first sentence, then the first line, then a hard cut. Blank
/// text and narration produce `None`.
pub fn summarize_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || is_narration(text) {
        return None;
    }
    let sentence = collapse_whitespace(first_sentence(text));
    if sentence.chars().count() <= TEXT_LINE_MAX {
        return Some(sentence);
    }
    let line = text.lines().next().unwrap_or(text).trim();
    if line.chars().count() <= TEXT_LINE_MAX {
        return Some(line.to_string());
    }
    Some(truncate_chars(text, TEXT_LINE_MAX))
}

/// Text up to and including the first sentence terminator that is followed
/// by whitespace or the end of text. A sentence may wrap across lines.
fn first_sentence(text: &str) -> &str {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let end = idx + ch.len_utf8();
            match chars.peek() {
                None => return &text[..end],
                Some((_, next)) if next.is_whitespace() => return &text[..end],
                _ => {}
            }
        }
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordination_tools_are_hidden() {
        assert_eq!(describe_tool("TaskUpdate", &json!({})), None);
        assert_eq!(describe_tool("SendMessage", &json!({"to": "x"})), None);
    }

    #[test]
    fn describes_common_tools() {
        assert_eq!(
            describe_tool("Read", &json!({"file_path": "src/lib.rs"})).as_deref(),
            Some("Reading src/lib.rs")
        );
        assert_eq!(
            describe_tool("Bash", &json!({"command": "cargo test\necho done"})).as_deref(),
            Some("Running: cargo test")
        );
        assert_eq!(
            describe_tool("Grep", &json!({"pattern": "fn main"})).as_deref(),
            Some("Searching: fn main")
        );
        assert_eq!(describe_tool("Mystery", &json!(null)).as_deref(), Some("Mystery"));
    }

    #[test]
    fn tool_lines_are_capped() {
        let long = "x".repeat(200);
        let line = describe_tool("Write", &json!({"file_path": long})).expect("line");
        assert_eq!(line.chars().count(), TOOL_LINE_MAX);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn narration_is_suppressed() {
        assert!(is_narration("I'll now use the Read tool to inspect the file."));
        assert!(is_narration("Let me call Grep for that."));
        assert!(is_narration("I will run the tests."));
        assert!(!is_narration("I found three failing tests in the parser."));
        assert_eq!(summarize_text("I will now call Bash"), None);
    }

    #[test]
    fn prefers_first_sentence() {
        let text = "The schema is ready. Next I wire up the handlers and the tests.";
        assert_eq!(summarize_text(text).as_deref(), Some("The schema is ready."));
    }

    #[test]
    fn wrapped_sentence_is_joined_onto_one_line() {
        let text = "The schema\nis ready. Next I wire up the handlers.";
        assert_eq!(summarize_text(text).as_deref(), Some("The schema is ready."));
    }

    #[test]
    fn long_sentence_falls_back_to_first_line() {
        let text = format!("Wiring the handlers\n{}", "and more ".repeat(40));
        assert_eq!(summarize_text(&text).as_deref(), Some("Wiring the handlers"));
    }

    #[test]
    fn version_numbers_do_not_end_sentences() {
        assert_eq!(
            summarize_text("Bumped to 1.2.3 today").as_deref(),
            Some("Bumped to 1.2.3 today")
        );
    }

    #[test]
    fn falls_back_to_hard_cut_with_larger_budget() {
        let text = "word ".repeat(100);
        let summary = summarize_text(&text).expect("summary");
        assert_eq!(summary.chars().count(), TEXT_LINE_MAX);
        assert!(summary.chars().count() > TOOL_LINE_MAX);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 5), "éé...");
    }
}
