//! Session events emitted by the execution provider.
//!
//! The provider speaks newline-delimited JSON. Each line is decoded into a
//! [`SessionEvent`]; shapes we do not recognise decode to
//! [`SessionEvent::Unknown`] so a consumer can simply ignore them.

use serde::Deserialize;
use serde_json::Value;

/// One event from the running session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Lifecycle signal; `subtype == "init"` marks session start.
    System {
        subtype: String,
        session_id: Option<String>,
    },
    /// A turn produced by the lead (no parent) or by a spawned participant.
    Assistant {
        parent_tool_use_id: Option<String>,
        blocks: Vec<ContentBlock>,
    },
    /// A tool result delivered back into a turn.
    User {
        parent_tool_use_id: Option<String>,
        has_tool_result: bool,
    },
    /// Heartbeat for a long-running tool call.
    ToolProgress {
        parent_tool_use_id: Option<String>,
        tool_name: String,
        elapsed_time_seconds: f64,
    },
    /// Terminal outcome of the whole session.
    Result(ResultSummary),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    ToolUse {
        id: Option<String>,
        name: String,
        input: Value,
    },
    Text(String),
    Other,
}

/// Cost and outcome reported by the provider's terminal event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSummary {
    pub subtype: String,
    pub session_id: Option<String>,
    pub total_cost_usd: f64,
    pub duration_ms: Option<u64>,
    pub result: Option<String>,
    pub errors: Vec<String>,
}

impl ResultSummary {
    pub fn is_success(&self) -> bool {
        self.subtype == "success"
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    System {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        #[serde(default)]
        message: RawMessage,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    User {
        #[serde(default)]
        tool_use_result: Option<Value>,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    ToolProgress {
        tool_name: String,
        #[serde(default)]
        elapsed_time_seconds: f64,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        total_cost_usd: f64,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        errors: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Default)]
struct RawMessage {
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl From<RawBlock> for ContentBlock {
    fn from(raw: RawBlock) -> Self {
        match raw {
            RawBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
            RawBlock::Text { text } => ContentBlock::Text(text),
            RawBlock::Other => ContentBlock::Other,
        }
    }
}

impl SessionEvent {
    /// Decode one provider output line.
    ///
    /// Blank lines and lines that are not a JSON object with a known shape
    /// return `None`; objects with an unrecognised `type` return `Unknown`.
    pub fn parse_line(line: &str) -> Option<SessionEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let raw: RawEvent = serde_json::from_str(line).ok()?;
        Some(raw.into())
    }

    pub fn is_init(&self) -> bool {
        matches!(self, SessionEvent::System { subtype, .. } if subtype == "init")
    }
}

impl From<RawEvent> for SessionEvent {
    fn from(raw: RawEvent) -> Self {
        match raw {
            RawEvent::System {
                subtype,
                session_id,
            } => SessionEvent::System {
                subtype,
                session_id,
            },
            RawEvent::Assistant {
                message,
                parent_tool_use_id,
            } => SessionEvent::Assistant {
                parent_tool_use_id,
                blocks: decode_blocks(message.content),
            },
            RawEvent::User {
                tool_use_result,
                parent_tool_use_id,
            } => SessionEvent::User {
                parent_tool_use_id,
                has_tool_result: tool_use_result.is_some_and(|v| !v.is_null()),
            },
            RawEvent::ToolProgress {
                tool_name,
                elapsed_time_seconds,
                parent_tool_use_id,
            } => SessionEvent::ToolProgress {
                parent_tool_use_id,
                tool_name,
                elapsed_time_seconds,
            },
            RawEvent::Result {
                subtype,
                session_id,
                total_cost_usd,
                duration_ms,
                result,
                errors,
            } => SessionEvent::Result(ResultSummary {
                subtype,
                session_id,
                total_cost_usd,
                duration_ms,
                result,
                errors,
            }),
            RawEvent::Unknown => SessionEvent::Unknown,
        }
    }
}

/// Content that is not an array (e.g. a bare string) carries no blocks.
fn decode_blocks(content: Value) -> Vec<ContentBlock> {
    let Value::Array(items) = content else {
        return Vec::new();
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<RawBlock>(item)
                .map(ContentBlock::from)
                .unwrap_or(ContentBlock::Other)
        })
        .collect()
}
