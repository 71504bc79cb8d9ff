//! Error types for the hook relay protocol.

use thiserror::Error;

/// Errors that can occur while relaying a hook event.
///
/// None of these ever reach the agent runtime: the pipeline logs them and
/// resolves toward "allow" or "deliver nothing".
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unknown hook event type: {0}")]
    UnknownEventType(String),
    #[error("sink delivery failed: {0}")]
    Delivery(String),
}

/// Convenience result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Failure talking to the HITL decision service.
///
/// During the poll phase a malformed body means "still pending, keep
/// waiting" while a transport failure aborts the remaining attempts.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Connection refused, timeout, or a non-success HTTP status.
    #[error("decision service unreachable: {0}")]
    Transport(String),
    /// The service answered but the body could not be decoded.
    #[error("malformed decision service response: {0}")]
    Malformed(String),
}

impl DecisionError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type DecisionResult<T> = Result<T, DecisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_error_classifies_transport() {
        assert!(DecisionError::Transport("refused".into()).is_transport());
        assert!(!DecisionError::Malformed("eof".into()).is_transport());
    }

    #[test]
    fn unknown_event_type_names_the_input() {
        let error = "PostEverything".parse::<crate::HookEventType>().unwrap_err();
        assert_eq!(error.to_string(), "unknown hook event type: PostEverything");
    }
}
