//! Human-in-the-loop decision service wire types.
//!
//! The decision service owns intercepts; this side only reads them. Decoding
//! is lenient in the same places the service is loose: a missing `status`
//! reads as pending, a missing `message` falls back to a fixed text.

use serde::Serialize;
use serde_json::Value;

use crate::error::{DecisionError, DecisionResult};
use crate::ids::InterceptId;

/// Longest command excerpt sent to the check endpoint, in characters.
pub const COMMAND_EXCERPT_LIMIT: usize = 500;

/// Deny message used when the check response carried none.
pub const HITL_FALLBACK_MESSAGE: &str = "Blocked by HITL";

/// Query parameters of `GET /hitl/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRequest {
    pub tool_name: String,
    pub session_id: String,
    pub command: String,
}

impl CheckRequest {
    pub fn new(
        tool_name: impl Into<String>,
        session_id: impl Into<String>,
        command: &str,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            session_id: session_id.into(),
            command: command.chars().take(COMMAND_EXCERPT_LIMIT).collect(),
        }
    }
}

/// Decoded body of `GET /hitl/check`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResponse {
    pub action: Option<String>,
    pub intercept_id: Option<InterceptId>,
    pub message: Option<String>,
}

impl CheckResponse {
    pub const INTERCEPT: &'static str = "intercept";

    pub fn intercept(intercept_id: impl Into<InterceptId>, message: Option<String>) -> Self {
        Self {
            action: Some(Self::INTERCEPT.to_owned()),
            intercept_id: Some(intercept_id.into()),
            message,
        }
    }

    pub fn no_intercept() -> Self {
        Self {
            action: Some("no_intercept".to_owned()),
            ..Self::default()
        }
    }

    /// Decode a check body. Non-object bodies are malformed; individual
    /// fields of the wrong type read as absent.
    pub fn from_body(body: &Value) -> DecisionResult<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| DecisionError::Malformed("check body is not an object".into()))?;
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_owned);
        let intercept_id = match object.get("intercept_id") {
            Some(Value::String(id)) if !id.is_empty() => Some(InterceptId::from(id.as_str())),
            Some(Value::Number(id)) => Some(InterceptId::from(id.to_string())),
            _ => None,
        };
        Ok(Self {
            action: text("action"),
            intercept_id,
            message: text("message"),
        })
    }

    /// The intercept to wait on, if the service flagged this action.
    pub fn flagged_intercept(&self) -> Option<&InterceptId> {
        match self.action.as_deref() {
            Some(Self::INTERCEPT) => self.intercept_id.as_ref(),
            _ => None,
        }
    }

    pub fn deny_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| HITL_FALLBACK_MESSAGE.to_owned())
    }
}

/// Observed status of an intercept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptStatus {
    Pending,
    Approved,
    Blocked,
    /// Any other non-pending value; treated like approval.
    Other(String),
}

impl InterceptStatus {
    /// Decode an intercept body. Only a missing `status` key reads as
    /// pending; an explicit `null` is a decided, non-blocking status.
    pub fn from_body(body: &Value) -> DecisionResult<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| DecisionError::Malformed("intercept body is not an object".into()))?;
        Ok(match object.get("status") {
            None => Self::Pending,
            Some(Value::String(status)) => Self::from_label(status),
            Some(other) => Self::Other(other.to_string()),
        })
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "blocked" => Self::Blocked,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Outcome of the HITL gate. Only an explicitly observed `blocked` status
/// denies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Proceed,
    Deny { message: String },
}

impl GateResult {
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
        }
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}
