//! Raw hook records and their typed views.
//!
//! The agent runtime delivers one loosely-typed JSON object per lifecycle
//! moment. [`RawEventRecord`] keeps that object intact (it becomes the envelope
//! payload), while [`HookInput`] offers a per-kind view with explicit optional
//! fields. Reading a field never fails: wrong types and absent keys both come
//! back as `None`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::HookEventType;
use crate::guard::ProposedAction;

/// Open mapping of string keys to arbitrary values, as delivered on stdin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEventRecord(Map<String, Value>);

impl RawEventRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse hook input. Anything that is not a JSON object degrades to an
    /// empty record.
    pub fn parse(input: &str) -> Self {
        serde_json::from_str::<Value>(input)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, treating empty strings and non-strings as absent.
    pub fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.non_empty_str(key).map(str::to_owned)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawEventRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for RawEventRecord {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn nested_str<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value
        .and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

// ─── Typed views ────────────────────────────────────────────────────

/// Fields of a tool lifecycle record (PreToolUse, PostToolUse,
/// PostToolUseFailure).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolUseFields {
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    pub error: Option<Value>,
    top_level_command: Option<String>,
    top_level_path: Option<String>,
}

impl ToolUseFields {
    pub fn from_record(record: &RawEventRecord) -> Self {
        Self {
            tool_name: record.string("tool_name"),
            tool_input: record.get("tool_input").filter(|v| v.is_object()).cloned(),
            tool_response: record.get("tool_response").cloned(),
            error: record.get("error").cloned(),
            top_level_command: record.string("command"),
            top_level_path: record
                .string("path")
                .or_else(|| record.string("file_path")),
        }
    }

    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or_default()
    }

    /// Shell command text: `tool_input.command`, else a top-level `command`.
    pub fn command(&self) -> Option<&str> {
        nested_str(self.tool_input.as_ref(), "command").or(self.top_level_command.as_deref())
    }

    /// Target file: `tool_input.path` / `tool_input.file_path`, else the
    /// top-level equivalents.
    pub fn file_path(&self) -> Option<&str> {
        nested_str(self.tool_input.as_ref(), "path")
            .or_else(|| nested_str(self.tool_input.as_ref(), "file_path"))
            .or(self.top_level_path.as_deref())
    }

    pub fn proposed_action(&self) -> ProposedAction {
        ProposedAction {
            command: self.command().map(str::to_owned),
            path: self.file_path().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptFields {
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFields {
    pub source: Option<String>,
    pub end_reason: Option<String>,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubagentFields {
    pub parent_session_id: Option<String>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub transcript_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFields {
    pub message: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactFields {
    pub trigger: Option<String>,
    pub context_window_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopFields {
    pub stop_reason: Option<String>,
    pub transcript_path: Option<String>,
    pub stop_hook_active: bool,
}

/// Typed view over a raw record, discriminated by event kind.
#[derive(Debug, Clone, PartialEq)]
pub enum HookInput {
    ToolUse(ToolUseFields),
    Prompt(PromptFields),
    Session(SessionFields),
    Subagent(SubagentFields),
    Notification(NotificationFields),
    Compact(CompactFields),
    Stop(StopFields),
}

impl HookInput {
    pub fn from_record(event_type: HookEventType, record: &RawEventRecord) -> Self {
        match event_type {
            HookEventType::PreToolUse
            | HookEventType::PostToolUse
            | HookEventType::PostToolUseFailure
            | HookEventType::GuardBlock => Self::ToolUse(ToolUseFields::from_record(record)),
            HookEventType::UserPromptSubmit => Self::Prompt(PromptFields {
                prompt: record.get("prompt").and_then(Value::as_str).map(str::to_owned),
            }),
            HookEventType::SessionStart | HookEventType::SessionEnd => {
                Self::Session(SessionFields {
                    source: record.string("source"),
                    end_reason: record
                        .string("end_reason")
                        .or_else(|| record.string("reason")),
                    transcript_path: record.string("transcript_path"),
                    cwd: record.string("cwd"),
                })
            }
            HookEventType::SubagentStart | HookEventType::SubagentStop => {
                Self::Subagent(SubagentFields {
                    parent_session_id: record.string("parent_session_id"),
                    model: record.string("model"),
                    stop_reason: record.string("stop_reason"),
                    transcript_path: record.string("transcript_path"),
                })
            }
            HookEventType::Notification => Self::Notification(NotificationFields {
                message: record.string("message"),
                title: record.string("title"),
            }),
            HookEventType::PreCompact => Self::Compact(CompactFields {
                trigger: record.string("trigger"),
                context_window_tokens: record.get("context_window_tokens").and_then(Value::as_u64),
            }),
            HookEventType::Stop => Self::Stop(StopFields {
                stop_reason: record.string("stop_reason"),
                transcript_path: record.string("transcript_path"),
                stop_hook_active: record
                    .get("stop_hook_active")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }),
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseFields> {
        match self {
            Self::ToolUse(fields) => Some(fields),
            _ => None,
        }
    }
}
