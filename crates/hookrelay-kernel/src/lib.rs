//! Interception and gating pipeline.
//!
//! One [`HookKernel::handle`] call per hook invocation. Tool proposals go
//! through the safety guard and then the HITL gate; end-of-turn events run
//! under the reentrancy guard; everything else is normalized and relayed.
//! No downstream failure ever turns into an error for the caller.

pub mod config;
pub mod mapping;
pub mod response;

use std::sync::Arc;

use anyhow::Result;
use hookrelay_events::{HttpEventSink, SinkOptions};
use hookrelay_policy::{PatternGuard, SafetyGuard};
use hookrelay_protocol::{
    DecisionServicePort, EnvelopeContext, EventEnvelope, EventSinkPort, GateResult, HookEventType,
    HookInput, PromptFields, RawEventRecord, StopFields, ToolUseFields,
};
use hookrelay_runtime::{HitlGate, HitlTimings, HttpDecisionService, ReentrancyGuard};
use tracing::{debug, instrument, warn};

pub use crate::config::{DEFAULT_SERVER_URL, RelayConfig, normalize_tags, parse_tag_list};
pub use crate::response::HookResponse;

pub struct KernelBuilder {
    config: RelayConfig,
    safety_guard: Option<Arc<dyn SafetyGuard>>,
    event_sink: Option<Arc<dyn EventSinkPort>>,
    decision_service: Option<Arc<dyn DecisionServicePort>>,
    reentrancy: Option<ReentrancyGuard>,
    hitl_timings: HitlTimings,
    sink_options: SinkOptions,
}

impl KernelBuilder {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            safety_guard: None,
            event_sink: None,
            decision_service: None,
            reentrancy: None,
            hitl_timings: HitlTimings::default(),
            sink_options: SinkOptions::default(),
        }
    }

    pub fn safety_guard(mut self, safety_guard: Arc<dyn SafetyGuard>) -> Self {
        self.safety_guard = Some(safety_guard);
        self
    }

    pub fn event_sink(mut self, event_sink: Arc<dyn EventSinkPort>) -> Self {
        self.event_sink = Some(event_sink);
        self
    }

    pub fn decision_service(mut self, decision_service: Arc<dyn DecisionServicePort>) -> Self {
        self.decision_service = Some(decision_service);
        self
    }

    pub fn reentrancy_guard(mut self, reentrancy: ReentrancyGuard) -> Self {
        self.reentrancy = Some(reentrancy);
        self
    }

    pub fn hitl_timings(mut self, hitl_timings: HitlTimings) -> Self {
        self.hitl_timings = hitl_timings;
        self
    }

    pub fn sink_options(mut self, sink_options: SinkOptions) -> Self {
        self.sink_options = sink_options;
        self
    }

    /// Fills unset collaborators from the config: HTTP sink, HTTP decision
    /// service, default deny patterns, file-backed reentrancy marker.
    pub fn build(self) -> Result<HookKernel> {
        let event_sink = match self.event_sink {
            Some(sink) => sink,
            None => Arc::new(HttpEventSink::with_options(
                &self.config.server_url,
                self.sink_options,
            )?),
        };

        let hitl = if self.config.hitl_enabled {
            let service = match self.decision_service {
                Some(service) => service,
                None => Arc::new(HttpDecisionService::with_request_timeout(
                    self.config.decision_url(),
                    self.hitl_timings.poll_timeout,
                )?),
            };
            Some(HitlGate::new(service).with_timings(self.hitl_timings))
        } else {
            None
        };

        let safety_guard = self
            .safety_guard
            .unwrap_or_else(|| Arc::new(PatternGuard::default()));
        let reentrancy = self
            .reentrancy
            .unwrap_or_else(|| ReentrancyGuard::file_backed(&self.config.stop_marker));

        Ok(HookKernel {
            context: self.config.envelope_context(),
            stop_hook_active: self.config.stop_hook_active,
            safety_guard,
            event_sink,
            hitl,
            reentrancy,
        })
    }
}

#[derive(Clone)]
pub struct HookKernel {
    context: EnvelopeContext,
    stop_hook_active: bool,
    safety_guard: Arc<dyn SafetyGuard>,
    event_sink: Arc<dyn EventSinkPort>,
    hitl: Option<HitlGate>,
    reentrancy: ReentrancyGuard,
}

impl HookKernel {
    pub fn context(&self) -> &EnvelopeContext {
        &self.context
    }

    #[instrument(skip(self, record))]
    pub async fn handle(&self, event_type: HookEventType, record: RawEventRecord) -> HookResponse {
        match event_type {
            HookEventType::PreToolUse => self.pre_tool_use(record).await,
            kind if kind.is_end_of_turn() => self.end_of_turn(kind, record).await,
            kind => self.relay(kind, record).await,
        }
    }

    /// Guard, then HITL gate, then relay. The envelope is built before any
    /// I/O so a denial can always be audited.
    async fn pre_tool_use(&self, record: RawEventRecord) -> HookResponse {
        let fields = ToolUseFields::from_record(&record);
        let envelope = EventEnvelope::build(HookEventType::PreToolUse, &record, &self.context);

        let decision = self.safety_guard.evaluate(&fields.proposed_action());
        if decision.is_blocked() {
            let reason = decision.reason.unwrap_or_default();
            warn!(
                tool_name = fields.tool_name(),
                session_id = %envelope.session_id,
                %reason,
                "safety guard blocked tool call"
            );
            let audit = EventEnvelope {
                event_type: HookEventType::GuardBlock,
                ..envelope
            }
            .with_payload_field("block_reason", reason.clone());
            self.emit(&audit).await;
            return HookResponse::deny(reason);
        }

        if let Some(hitl) = &self.hitl {
            let session_id = record.non_empty_str("session_id").unwrap_or_default();
            let gate = hitl
                .check_and_wait(
                    fields.tool_name(),
                    session_id,
                    fields.command().unwrap_or_default(),
                )
                .await;
            if let GateResult::Deny { message } = gate {
                return HookResponse::deny(message);
            }
        }

        self.emit(&envelope).await;
        HookResponse::Proceed
    }

    async fn end_of_turn(&self, event_type: HookEventType, record: RawEventRecord) -> HookResponse {
        if self.stop_hook_active {
            debug!("end-of-turn guard forced active, skipping");
            return HookResponse::Proceed;
        }
        // The agent runtime flags a Stop that a previous stop hook already
        // continued from.
        if let HookInput::Stop(StopFields {
            stop_hook_active: true,
            ..
        }) = HookInput::from_record(event_type, &record)
        {
            debug!("end-of-turn continuation reported by runtime, skipping");
            return HookResponse::Proceed;
        }
        let Some(_scope) = self.reentrancy.enter() else {
            debug!("end-of-turn sequence already active, skipping");
            return HookResponse::Proceed;
        };
        self.relay(event_type, record).await
    }

    async fn relay(&self, event_type: HookEventType, mut record: RawEventRecord) -> HookResponse {
        let input = HookInput::from_record(event_type, &record);

        if let HookInput::Prompt(PromptFields {
            prompt: Some(prompt),
        }) = &input
            && let Some(truncated) = mapping::truncate_prompt(prompt)
        {
            debug!(original_chars = prompt.chars().count(), "prompt truncated");
            record.insert("prompt", truncated);
        }

        let mut envelope = EventEnvelope::build(event_type, &record, &self.context);

        match &input {
            HookInput::ToolUse(fields) if event_type == HookEventType::PostToolUse => {
                mapping::tag_mcp_tool(&mut envelope.payload, fields.tool_name());
            }
            HookInput::Subagent(fields) => {
                debug!(
                    parent_session_id = ?fields.parent_session_id,
                    model = ?fields.model,
                    "subagent lifecycle"
                );
            }
            HookInput::Session(fields) => {
                debug!(
                    source = ?fields.source,
                    end_reason = ?fields.end_reason,
                    cwd = ?fields.cwd,
                    "session lifecycle"
                );
            }
            HookInput::Notification(fields) => {
                debug!(title = ?fields.title, message = ?fields.message, "agent notification");
            }
            HookInput::Stop(fields) => {
                debug!(stop_reason = ?fields.stop_reason, "end of turn");
            }
            _ => {}
        }

        self.emit(&envelope).await;

        match input {
            HookInput::Compact(fields) => {
                debug!(trigger = ?fields.trigger, "compaction requested");
                HookResponse::compact_instructions()
            }
            _ => HookResponse::Proceed,
        }
    }

    async fn emit(&self, envelope: &EventEnvelope) {
        if let Err(error) = self.event_sink.emit(envelope).await {
            debug!(%error, event_type = %envelope.event_type, "envelope dropped");
        }
    }
}
