//! Boundary ports between the pipeline and its external collaborators.
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.

use async_trait::async_trait;

use crate::error::{DecisionResult, RelayResult};
use crate::event::EventEnvelope;
use crate::hitl::{CheckRequest, CheckResponse, InterceptStatus};
use crate::ids::InterceptId;

/// Destination for envelopes. Callers treat any error as "delivered nothing".
#[async_trait]
pub trait EventSinkPort: Send + Sync {
    async fn emit(&self, envelope: &EventEnvelope) -> RelayResult<()>;
}

/// Read-only view of the HITL decision service.
#[async_trait]
pub trait DecisionServicePort: Send + Sync {
    /// Ask whether this action is subject to human review.
    async fn check(&self, request: &CheckRequest) -> DecisionResult<CheckResponse>;

    /// Fetch the current status of an intercept.
    async fn intercept_status(&self, intercept_id: &InterceptId)
    -> DecisionResult<InterceptStatus>;
}
