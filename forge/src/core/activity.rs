//! Per-participant activity tracking for a running session.
//!
//! [`ActivityTracker`] consumes [`SessionEvent`]s strictly in arrival order and
//! turns them into display [`Activity`] items. It owns no output handle and
//! reads no clock: every call receives `now`, which keeps the progress throttle
//! and the elapsed-time summary deterministic under test.
//!
//! State machine per participant: the lead starts `Idle`, a spawned participant
//! starts `Spawning`, moves to `Working` on tool use or progress, and to `Done`
//! on a completion keyed to its id. `Done` is terminal.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::event::{ContentBlock, SessionEvent};
use super::summary::{describe_tool, is_spawn_tool, summarize_text, truncate_chars};

/// Display name of the lead participant.
pub const LEAD_NAME: &str = "Lead";
/// Longest display name derived from a spawn request.
pub const MAX_NAME_CHARS: usize = 20;
/// A progress event is only shown once the tool has run this long.
pub const PROGRESS_MIN_ELAPSED_SECS: f64 = 3.0;
/// Minimum gap between two progress lines for the same participant.
pub const PROGRESS_THROTTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    Spawning,
    Working,
    Idle,
    Done,
}

impl ParticipantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::Spawning => "spawning",
            ParticipantStatus::Working => "working",
            ParticipantStatus::Idle => "idle",
            ParticipantStatus::Done => "done",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of the lead or one spawned participant. Lives for one session.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub id: String,
    pub name: String,
    /// Position in the colour palette; the lead is always 0.
    pub palette_index: usize,
    pub status: ParticipantStatus,
    pub current_tool: Option<String>,
    pub last_progress_print: Option<Instant>,
    pub spawned_at: Instant,
}

impl ParticipantState {
    fn new(
        id: String,
        name: String,
        palette_index: usize,
        status: ParticipantStatus,
        now: Instant,
    ) -> Self {
        Self {
            id,
            name,
            palette_index,
            status,
            current_tool: None,
            last_progress_print: None,
            spawned_at: now,
        }
    }

    /// Record tool activity. A finished participant keeps its `Done` status.
    fn start_tool(&mut self, tool: &str) {
        self.current_tool = Some(tool.to_string());
        if self.status != ParticipantStatus::Done {
            self.status = ParticipantStatus::Working;
        }
    }

    /// Mark done; returns `false` if it already was.
    fn finish(&mut self) -> bool {
        if self.status == ParticipantStatus::Done {
            return false;
        }
        self.status = ParticipantStatus::Done;
        self.current_tool = None;
        true
    }
}

/// One line attributed to a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLine {
    pub speaker: String,
    pub palette_index: usize,
    pub text: String,
}

/// One row of the end-of-session team table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub name: String,
    pub palette_index: usize,
    pub status: ParticipantStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Line(ActivityLine),
    Summary(Vec<SummaryRow>),
}

/// Which participant an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Who {
    Lead,
    Spawned(usize),
}

pub struct ActivityTracker {
    stage: String,
    lead: ParticipantState,
    /// Spawned participants in spawn order.
    participants: Vec<ParticipantState>,
    by_id: HashMap<String, usize>,
    spawn_count: usize,
    started_at: Option<Instant>,
}

impl ActivityTracker {
    pub fn new(stage: impl Into<String>, now: Instant) -> Self {
        Self {
            stage: stage.into(),
            lead: ParticipantState::new(
                "lead".to_string(),
                LEAD_NAME.to_string(),
                0,
                ParticipantStatus::Idle,
                now,
            ),
            participants: Vec::new(),
            by_id: HashMap::new(),
            spawn_count: 0,
            started_at: None,
        }
    }

    pub fn lead(&self) -> &ParticipantState {
        &self.lead
    }

    pub fn participants(&self) -> &[ParticipantState] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&ParticipantState> {
        self.by_id.get(id).map(|&idx| &self.participants[idx])
    }

    /// Time of the session-start signal, if seen.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Widest display name, used to align prefixes.
    pub fn name_width(&self) -> usize {
        self.participants
            .iter()
            .map(|p| p.name.chars().count().min(MAX_NAME_CHARS))
            .chain(std::iter::once(LEAD_NAME.len()))
            .max()
            .unwrap_or(LEAD_NAME.len())
    }

    /// Classify one event and return what should be displayed for it.
    pub fn on_event(&mut self, event: &SessionEvent, now: Instant) -> Vec<Activity> {
        let mut out = Vec::new();
        match event {
            SessionEvent::System { .. } if event.is_init() => {
                self.started_at = Some(now);
                let text = format!("Session started ({})", self.stage);
                out.push(self.line(Who::Lead, text));
            }
            SessionEvent::Assistant {
                parent_tool_use_id,
                blocks,
            } => {
                let who = self.resolve(parent_tool_use_id.as_deref());
                for block in blocks {
                    self.on_block(who, block, now, &mut out);
                }
            }
            SessionEvent::ToolProgress {
                parent_tool_use_id,
                tool_name,
                elapsed_time_seconds,
            } => {
                let who = self.resolve(parent_tool_use_id.as_deref());
                let participant = self.state_mut(who);
                participant.start_tool(tool_name);
                let throttled = participant
                    .last_progress_print
                    .is_some_and(|last| now.saturating_duration_since(last) < PROGRESS_THROTTLE);
                if *elapsed_time_seconds >= PROGRESS_MIN_ELAPSED_SECS && !throttled {
                    participant.last_progress_print = Some(now);
                    let text = format!("⏳ {} ({}s)", tool_name, elapsed_time_seconds.round());
                    out.push(self.line(who, text));
                }
            }
            SessionEvent::User {
                parent_tool_use_id: Some(parent),
                has_tool_result: true,
            } => {
                if let Some(&idx) = self.by_id.get(parent.as_str())
                    && self.participants[idx].finish()
                {
                    out.push(self.line(Who::Spawned(idx), "Done ✓".to_string()));
                }
            }
            SessionEvent::Result(_) => {
                if !self.participants.is_empty() {
                    out.push(Activity::Summary(self.summary(now)));
                }
            }
            _ => {}
        }
        out
    }

    fn on_block(&mut self, who: Who, block: &ContentBlock, now: Instant, out: &mut Vec<Activity>) {
        match block {
            ContentBlock::ToolUse { id, name, input } if is_spawn_tool(name) => {
                let spawned = self.register(id.clone(), &spawn_name(input), now);
                let spawned_name = self.participants[spawned].name.clone();
                out.push(self.line(who, format!("Spawning teammate: {spawned_name}")));
                out.push(self.line(Who::Spawned(spawned), "Started".to_string()));
            }
            ContentBlock::ToolUse { name, input, .. } => {
                self.state_mut(who).start_tool(name);
                if let Some(text) = describe_tool(name, input) {
                    out.push(self.line(who, text));
                }
            }
            ContentBlock::Text(text) => {
                if let Some(summary) = summarize_text(text) {
                    out.push(self.line(who, summary));
                }
            }
            ContentBlock::Other => {}
        }
    }

    /// Register a spawned participant and return its index.
    ///
    /// A name already used by the lead or an earlier participant gets a
    /// numeric suffix, starting at the running spawn count and rising until
    /// the result is unused.
    fn register(&mut self, id: Option<String>, name: &str, now: Instant) -> usize {
        let id = id.unwrap_or_else(|| format!("task-{}", self.spawn_count));
        self.spawn_count += 1;
        let mut display = name.to_string();
        let mut suffix = self.spawn_count;
        while self.name_taken(&display) {
            display = format!("{name}-{suffix}");
            suffix += 1;
        }
        let idx = self.participants.len();
        self.participants.push(ParticipantState::new(
            id.clone(),
            display,
            self.spawn_count,
            ParticipantStatus::Spawning,
            now,
        ));
        self.by_id.insert(id, idx);
        idx
    }

    fn name_taken(&self, name: &str) -> bool {
        self.lead.name == name || self.participants.iter().any(|p| p.name == name)
    }

    /// Unknown or absent parent ids fall back to the lead.
    fn resolve(&self, parent_tool_use_id: Option<&str>) -> Who {
        parent_tool_use_id
            .and_then(|id| self.by_id.get(id))
            .map_or(Who::Lead, |&idx| Who::Spawned(idx))
    }

    fn state(&self, who: Who) -> &ParticipantState {
        match who {
            Who::Lead => &self.lead,
            Who::Spawned(idx) => &self.participants[idx],
        }
    }

    fn state_mut(&mut self, who: Who) -> &mut ParticipantState {
        match who {
            Who::Lead => &mut self.lead,
            Who::Spawned(idx) => &mut self.participants[idx],
        }
    }

    fn line(&self, who: Who, text: String) -> Activity {
        let state = self.state(who);
        Activity::Line(ActivityLine {
            speaker: state.name.clone(),
            palette_index: state.palette_index,
            text,
        })
    }

    fn summary(&self, now: Instant) -> Vec<SummaryRow> {
        self.participants
            .iter()
            .map(|p| SummaryRow {
                name: p.name.clone(),
                palette_index: p.palette_index,
                status: p.status,
                elapsed: now.saturating_duration_since(p.spawned_at),
            })
            .collect()
    }
}

/// Display name for a spawn request: `name`, else `description`, else `agent`.
pub fn spawn_name(input: &Value) -> String {
    let field = |key: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    if let Some(name) = field("name") {
        return name.chars().take(MAX_NAME_CHARS).collect();
    }
    if let Some(description) = field("description") {
        return truncate_chars(description, MAX_NAME_CHARS);
    }
    "agent".to_string()
}
