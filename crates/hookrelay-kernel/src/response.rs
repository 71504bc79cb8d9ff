//! What a hook invocation tells the agent runtime.
//!
//! Denial is communicated through stdout content, never through the process
//! exit status.

use serde_json::{Value, json};

use crate::mapping::COMPACT_INSTRUCTIONS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResponse {
    /// Nothing on stdout; the agent carries on.
    Proceed,
    /// `{"type": "deny_tool", "message": ...}`
    Deny { message: String },
    /// `{"custom_instructions": ...}` for the compactor.
    CompactInstructions { custom_instructions: String },
}

impl HookResponse {
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
        }
    }

    pub fn compact_instructions() -> Self {
        Self::CompactInstructions {
            custom_instructions: COMPACT_INSTRUCTIONS.to_owned(),
        }
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }

    /// The JSON document to print on stdout, if any.
    pub fn stdout_payload(&self) -> Option<Value> {
        match self {
            Self::Proceed => None,
            Self::Deny { message } => Some(json!({"type": "deny_tool", "message": message})),
            Self::CompactInstructions {
                custom_instructions,
            } => Some(json!({"custom_instructions": custom_instructions})),
        }
    }
}
