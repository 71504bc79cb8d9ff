//! Event sinks for relayed envelopes.
//!
//! Delivery is best-effort and at-most-once: one POST, no retry, response
//! body ignored. Callers decide what to do with a delivery error (the kernel
//! logs and drops it).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hookrelay_protocol::{EventEnvelope, EventSinkPort, HookEventType, RelayError, RelayResult};
use parking_lot::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub timeout: Duration,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

/// Posts envelopes to `{base_url}/events`.
#[derive(Debug, Clone)]
pub struct HttpEventSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventSink {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, SinkOptions::default())
    }

    pub fn with_options(base_url: &str, options: SinkOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build event sink HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/events", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSinkPort for HttpEventSink {
    #[instrument(
        skip(self, envelope),
        fields(
            event_type = %envelope.event_type,
            session_id = %envelope.session_id,
            endpoint = %self.endpoint
        )
    )]
    async fn emit(&self, envelope: &EventEnvelope) -> RelayResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .await
            .map_err(|error| RelayError::Delivery(error.to_string()))?;
        debug!(status = %response.status(), "envelope posted");
        Ok(())
    }
}

/// In-memory sink that keeps every envelope it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    envelopes: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes.lock().clone()
    }

    pub fn of_type(&self, event_type: HookEventType) -> Vec<EventEnvelope> {
        self.envelopes
            .lock()
            .iter()
            .filter(|envelope| envelope.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.lock().is_empty()
    }
}

#[async_trait]
impl EventSinkPort for RecordingEventSink {
    async fn emit(&self, envelope: &EventEnvelope) -> RelayResult<()> {
        self.envelopes.lock().push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use hookrelay_protocol::{
        EnvelopeContext, EventEnvelope, EventSinkPort, HookEventType, RawEventRecord, RelayError,
    };
    use parking_lot::Mutex;
    use serde_json::Value;

    use crate::{HttpEventSink, RecordingEventSink, SinkOptions};

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn spawn_collector(status: StatusCode) -> Result<(String, Received)> {
        async fn collect(
            State((received, status)): State<(Received, StatusCode)>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            received.lock().push(body);
            status
        }

        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/events", post(collect))
            .with_state((received.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok((format!("http://{addr}"), received))
    }

    fn refused_url() -> Result<String> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);
        Ok(format!("http://{addr}"))
    }

    fn sample_envelope() -> EventEnvelope {
        let record = RawEventRecord::new()
            .with("session_id", "sess-1")
            .with("tool_name", "Bash");
        EventEnvelope::build(
            HookEventType::PostToolUse,
            &record,
            &EnvelopeContext::new("relay-tests", vec!["ci".into()]),
        )
    }

    #[tokio::test]
    async fn http_sink_posts_envelope_json() -> Result<()> {
        let (base, received) = spawn_collector(StatusCode::CREATED).await?;
        let sink = HttpEventSink::new(&format!("{base}/"))?;
        assert_eq!(sink.endpoint(), format!("{base}/events"));

        sink.emit(&sample_envelope()).await?;

        let bodies = received.lock().clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["event_type"], "PostToolUse");
        assert_eq!(bodies[0]["session_id"], "sess-1");
        assert_eq!(bodies[0]["source_app"], "relay-tests");
        assert_eq!(bodies[0]["payload"]["tool_name"], "Bash");
        Ok(())
    }

    #[tokio::test]
    async fn http_sink_ignores_response_status() -> Result<()> {
        let (base, received) = spawn_collector(StatusCode::INTERNAL_SERVER_ERROR).await?;
        let sink = HttpEventSink::new(&base)?;
        sink.emit(&sample_envelope()).await?;
        assert_eq!(received.lock().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn http_sink_reports_unreachable_collector() -> Result<()> {
        let sink = HttpEventSink::with_options(
            &refused_url()?,
            SinkOptions {
                timeout: Duration::from_millis(500),
            },
        )?;
        let err = sink.emit(&sample_envelope()).await.unwrap_err();
        assert!(matches!(err, RelayError::Delivery(_)));
        Ok(())
    }

    #[tokio::test]
    async fn recording_sink_filters_by_type() -> Result<()> {
        let sink = RecordingEventSink::new();
        assert!(sink.is_empty());
        sink.emit(&sample_envelope()).await?;
        let guard_block = EventEnvelope::build(
            HookEventType::GuardBlock,
            &RawEventRecord::new(),
            &EnvelopeContext::default(),
        );
        sink.emit(&guard_block).await?;

        assert_eq!(sink.envelopes().len(), 2);
        assert_eq!(sink.of_type(HookEventType::GuardBlock).len(), 1);
        assert_eq!(sink.of_type(HookEventType::Stop).len(), 0);
        Ok(())
    }
}
