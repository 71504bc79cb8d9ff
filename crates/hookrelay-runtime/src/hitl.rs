//! Human-in-the-loop gate.
//!
//! Two phases: a single bounded check call, then (only when the service
//! flags the action) a bounded poll loop over the intercept status. The gate
//! is fail-open: only an explicitly observed `blocked` status denies.
//!
//! Poll failures are not all alike. A malformed body counts as "still
//! pending" and the loop keeps waiting; a transport failure (refused
//! connection, timeout, error status) abandons the remaining attempts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hookrelay_protocol::{
    CheckRequest, CheckResponse, DecisionError, DecisionResult, DecisionServicePort, GateResult,
    InterceptId, InterceptStatus,
};
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitlTimings {
    pub check_timeout: Duration,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for HitlTimings {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            max_polls: 60,
        }
    }
}

/// What the poll loop saw before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observation {
    Decided(InterceptStatus),
    /// Budget exhausted while still pending.
    Undecided,
    /// Transport failure mid-poll.
    Unreachable,
}

#[derive(Clone)]
pub struct HitlGate {
    service: Arc<dyn DecisionServicePort>,
    timings: HitlTimings,
}

impl HitlGate {
    pub fn new(service: Arc<dyn DecisionServicePort>) -> Self {
        Self {
            service,
            timings: HitlTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: HitlTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn timings(&self) -> &HitlTimings {
        &self.timings
    }

    /// Never fails. Everything short of an observed `blocked` status
    /// resolves to [`GateResult::Proceed`].
    #[instrument(skip(self, command_excerpt))]
    pub async fn check_and_wait(
        &self,
        tool_name: &str,
        session_id: &str,
        command_excerpt: &str,
    ) -> GateResult {
        let request = CheckRequest::new(tool_name, session_id, command_excerpt);
        let check = match timeout(self.timings.check_timeout, self.service.check(&request)).await
        {
            Ok(Ok(check)) => check,
            Ok(Err(error)) => {
                debug!(%error, "hitl check failed, proceeding");
                return GateResult::Proceed;
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.timings.check_timeout.as_millis() as u64,
                    "hitl check timed out, proceeding"
                );
                return GateResult::Proceed;
            }
        };

        let Some(intercept_id) = check.flagged_intercept() else {
            debug!(action = ?check.action, "action not intercepted");
            return GateResult::Proceed;
        };

        info!(intercept_id = %intercept_id, "action intercepted, awaiting human decision");
        match self.await_decision(intercept_id).await {
            Observation::Decided(InterceptStatus::Blocked) => {
                info!(intercept_id = %intercept_id, "action blocked by reviewer");
                GateResult::deny(check.deny_message())
            }
            observation => {
                debug!(intercept_id = %intercept_id, ?observation, "proceeding after hitl wait");
                GateResult::Proceed
            }
        }
    }

    async fn await_decision(&self, intercept_id: &InterceptId) -> Observation {
        for attempt in 1..=self.timings.max_polls {
            sleep(self.timings.poll_interval).await;
            let polled = timeout(
                self.timings.poll_timeout,
                self.service.intercept_status(intercept_id),
            )
            .await;

            match polled {
                Ok(Ok(status)) if status.is_pending() => continue,
                Ok(Ok(status)) => return Observation::Decided(status),
                Ok(Err(DecisionError::Malformed(reason))) => {
                    debug!(attempt, %reason, "malformed intercept status, still pending");
                }
                Ok(Err(DecisionError::Transport(reason))) => {
                    debug!(attempt, %reason, "decision service unreachable, abandoning wait");
                    return Observation::Unreachable;
                }
                Err(_) => {
                    debug!(attempt, "intercept poll timed out, abandoning wait");
                    return Observation::Unreachable;
                }
            }
        }
        Observation::Undecided
    }
}

/// Decision service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDecisionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDecisionService {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_request_timeout(base_url, Duration::from_secs(1))
    }

    pub fn with_request_timeout(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build decision service HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn read_json(response: reqwest::Response) -> DecisionResult<Value> {
        let response = response
            .error_for_status()
            .map_err(|error| DecisionError::Transport(error.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|error| DecisionError::Transport(error.to_string()))?;
        serde_json::from_slice(&body).map_err(|error| DecisionError::Malformed(error.to_string()))
    }
}

#[async_trait]
impl DecisionServicePort for HttpDecisionService {
    async fn check(&self, request: &CheckRequest) -> DecisionResult<CheckResponse> {
        let response = self
            .client
            .get(format!("{}/hitl/check", self.base_url))
            .query(request)
            .send()
            .await
            .map_err(|error| DecisionError::Transport(error.to_string()))?;
        CheckResponse::from_body(&Self::read_json(response).await?)
    }

    async fn intercept_status(
        &self,
        intercept_id: &InterceptId,
    ) -> DecisionResult<InterceptStatus> {
        let response = self
            .client
            .get(format!("{}/hitl/intercepts/{intercept_id}", self.base_url))
            .send()
            .await
            .map_err(|error| DecisionError::Transport(error.to_string()))?;
        InterceptStatus::from_body(&Self::read_json(response).await?)
    }
}
