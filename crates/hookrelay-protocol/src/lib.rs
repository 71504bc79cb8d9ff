//! # hookrelay-protocol: canonical hook relay protocol
//!
//! Shared types, event taxonomy, and port traits for the hook relay. The
//! crate has no runtime dependencies (no tokio, no HTTP client) so it can be
//! used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SessionId, TraceId, InterceptId)
//! - [`event`]: HookEventType, EventEnvelope and its builder
//! - [`record`]: RawEventRecord and the typed HookInput views
//! - [`guard`]: ProposedAction, GuardDecision
//! - [`hitl`]: decision service wire types and GateResult
//! - [`ports`]: event sink and decision service boundaries
//! - [`error`]: RelayError, DecisionError

pub mod error;
pub mod event;
pub mod guard;
pub mod hitl;
pub mod ids;
pub mod ports;
pub mod record;

pub use error::{DecisionError, DecisionResult, RelayError, RelayResult};
pub use event::{EnvelopeContext, EventEnvelope, HookEventType, TOP_LEVEL_FIELDS};
pub use guard::{GuardDecision, ProposedAction};
pub use hitl::{
    COMMAND_EXCERPT_LIMIT, CheckRequest, CheckResponse, GateResult, HITL_FALLBACK_MESSAGE,
    InterceptStatus,
};
pub use ids::{InterceptId, SessionId, TraceId};
pub use ports::{DecisionServicePort, EventSinkPort};
pub use record::{
    CompactFields, HookInput, NotificationFields, PromptFields, RawEventRecord, SessionFields,
    StopFields, SubagentFields, ToolUseFields,
};
