//! Canonical event taxonomy and the wire envelope.
//!
//! Every hook invocation produces at most one [`EventEnvelope`] per emitted
//! event. Construction is total: whatever the raw record is missing degrades
//! to a documented default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::ids::{SessionId, TraceId};
use crate::record::RawEventRecord;

/// Raw-record keys lifted into the envelope and excluded from the payload.
pub const TOP_LEVEL_FIELDS: [&str; 3] = ["session_id", "trace_id", "parent_session_id"];

/// Lifecycle discriminator. Serialized with its PascalCase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventType {
    SessionStart,
    SessionEnd,
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    Notification,
    UserPromptSubmit,
    PreCompact,
    Stop,
    SubagentStart,
    SubagentStop,
    /// Produced internally when the safety guard denies an action.
    GuardBlock,
}

impl HookEventType {
    pub const ALL: [HookEventType; 12] = [
        Self::SessionStart,
        Self::SessionEnd,
        Self::PreToolUse,
        Self::PostToolUse,
        Self::PostToolUseFailure,
        Self::Notification,
        Self::UserPromptSubmit,
        Self::PreCompact,
        Self::Stop,
        Self::SubagentStart,
        Self::SubagentStop,
        Self::GuardBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::Notification => "Notification",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreCompact => "PreCompact",
            Self::Stop => "Stop",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::GuardBlock => "GuardBlock",
        }
    }

    /// End-of-turn events run under the reentrancy guard.
    pub fn is_end_of_turn(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `PreToolUse`, `pre-tool-use` and `pre_tool_use` alike.
impl FromStr for HookEventType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| RelayError::UnknownEventType(s.to_owned()))
    }
}

/// Ambient context stamped on every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeContext {
    pub source_app: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EnvelopeContext {
    pub const UNKNOWN_APP: &'static str = "unknown";

    pub fn new(source_app: impl Into<String>, tags: Vec<String>) -> Self {
        let source_app = source_app.into();
        Self {
            source_app: if source_app.trim().is_empty() {
                Self::UNKNOWN_APP.to_owned()
            } else {
                source_app
            },
            tags,
        }
    }
}

impl Default for EnvelopeContext {
    fn default() -> Self {
        Self {
            source_app: Self::UNKNOWN_APP.to_owned(),
            tags: Vec::new(),
        }
    }
}

/// The normalized, wire-ready representation of one lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: HookEventType,
    pub session_id: SessionId,
    pub trace_id: TraceId,
    #[serde(default)]
    pub parent_session_id: Option<SessionId>,
    pub source_app: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Milliseconds since UNIX epoch.
    pub timestamp: u64,
}

impl EventEnvelope {
    /// Build an envelope from a raw record.
    ///
    /// - `session_id` falls back to `"unknown"`.
    /// - `trace_id` falls back to the raw session id, then to a fresh UUID.
    /// - `parent_session_id` stays `None` when absent.
    /// - Every other raw field lands in `payload`, in raw order.
    pub fn build(
        event_type: HookEventType,
        record: &RawEventRecord,
        context: &EnvelopeContext,
    ) -> Self {
        let session_id = record
            .non_empty_str("session_id")
            .map(SessionId::from)
            .unwrap_or_default();
        let trace_id = record
            .non_empty_str("trace_id")
            .or_else(|| record.non_empty_str("session_id"))
            .map(TraceId::from)
            .unwrap_or_default();
        let parent_session_id = record
            .non_empty_str("parent_session_id")
            .map(SessionId::from);

        let payload = record
            .as_map()
            .iter()
            .filter(|(key, _)| !TOP_LEVEL_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            event_type,
            session_id,
            trace_id,
            parent_session_id,
            source_app: context.source_app.clone(),
            tags: context.tags.clone(),
            payload,
            timestamp: Self::now_millis(),
        }
    }

    /// Current time in milliseconds since UNIX epoch.
    pub fn now_millis() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }

    pub fn with_payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}
