//! Safety guard value types.

/// The part of a tool invocation the safety guard inspects. Usually only one
/// of the two is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposedAction {
    pub command: Option<String>,
    pub path: Option<String>,
}

impl ProposedAction {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            path: None,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            command: None,
            path: Some(path.into()),
        }
    }
}

/// Transient guard verdict, consumed immediately by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardDecision {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl GuardDecision {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}
