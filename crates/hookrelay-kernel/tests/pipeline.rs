//! End-to-end pipeline runs against a live collector and decision service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use hookrelay_kernel::{HookKernel, HookResponse, KernelBuilder, RelayConfig};
use hookrelay_protocol::{HookEventType, RawEventRecord};
use hookrelay_runtime::{HitlTimings, STOP_MARKER_FILE};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Collector {
    events: Arc<Mutex<Vec<Value>>>,
    checks: Arc<Mutex<usize>>,
}

impl Collector {
    fn events(&self) -> Vec<Value> {
        self.events.lock().clone()
    }

    fn of_type(&self, event_type: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["event_type"] == event_type)
            .collect()
    }
}

/// Collector plus decision service on one port. `check_body` is returned for
/// every check; intercepts always report `intercept_status`.
async fn spawn_server(
    check_body: Value,
    intercept_status: &'static str,
) -> Result<(String, Collector)> {
    let collector = Collector::default();

    let app = Router::new()
        .route(
            "/events",
            post(
                |State(collector): State<Collector>, Json(event): Json<Value>| async move {
                    collector.events.lock().push(event);
                    Json(json!({"ok": true}))
                },
            ),
        )
        .route(
            "/hitl/check",
            get(move |State(collector): State<Collector>| {
                let body = check_body.clone();
                async move {
                    *collector.checks.lock() += 1;
                    Json(body)
                }
            }),
        )
        .route(
            "/hitl/intercepts/{id}",
            get(move |Path(_id): Path<String>| async move {
                Json(json!({"status": intercept_status}))
            }),
        )
        .with_state(collector.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), collector))
}

fn refused_url() -> Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

fn unique_test_root(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("{name}-{nanos}"))
}

fn kernel(config: RelayConfig) -> Result<HookKernel> {
    KernelBuilder::new(config)
        .hitl_timings(HitlTimings {
            poll_interval: Duration::from_millis(5),
            ..HitlTimings::default()
        })
        .build()
}

fn config(server_url: &str, marker_root: &std::path::Path) -> RelayConfig {
    RelayConfig {
        server_url: server_url.to_owned(),
        source_app: "pipeline-tests".into(),
        stop_marker: marker_root.join(STOP_MARKER_FILE),
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn sensitive_write_is_denied_and_audited() -> Result<()> {
    let (url, collector) = spawn_server(json!({"action": "allow"}), "approved").await?;
    let root = unique_test_root("hookrelay-guard");
    let kernel = kernel(config(&url, &root))?;

    let record = RawEventRecord::parse(r#"{"tool_name": "Write", "path": ".env"}"#);
    let response = kernel.handle(HookEventType::PreToolUse, record).await;

    let HookResponse::Deny { message } = &response else {
        panic!("expected deny, got {response:?}");
    };
    assert!(message.contains(".env"));
    assert_eq!(
        response.stdout_payload(),
        Some(json!({"type": "deny_tool", "message": message}))
    );

    let blocks = collector.of_type("GuardBlock");
    assert_eq!(blocks.len(), 1);
    assert!(
        blocks[0]["payload"]["block_reason"]
            .as_str()
            .unwrap()
            .contains(".env")
    );
    assert_eq!(blocks[0]["session_id"], "unknown");
    assert!(collector.of_type("PreToolUse").is_empty());
    // The guard short-circuits before the decision service is consulted.
    assert_eq!(*collector.checks.lock(), 0);
    Ok(())
}

#[tokio::test]
async fn unreachable_decision_service_fails_open() -> Result<()> {
    let (url, collector) = spawn_server(json!({}), "approved").await?;
    let root = unique_test_root("hookrelay-failopen");
    let kernel = kernel(RelayConfig {
        hitl_server_url: Some(refused_url()?),
        ..config(&url, &root)
    })?;

    let record = RawEventRecord::parse(r#"{"tool_name": "Bash", "command": "echo hi"}"#);
    let started = Instant::now();
    let response = kernel.handle(HookEventType::PreToolUse, record).await;

    assert_eq!(response, HookResponse::Proceed);
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(collector.of_type("GuardBlock").is_empty());
    let relayed = collector.of_type("PreToolUse");
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0]["payload"]["command"], "echo hi");
    Ok(())
}

#[tokio::test]
async fn reviewer_block_denies_with_service_message() -> Result<()> {
    let (url, collector) = spawn_server(
        json!({
            "action": "intercept",
            "intercept_id": "icpt-1",
            "message": "Production deploys need sign-off"
        }),
        "blocked",
    )
    .await?;
    let root = unique_test_root("hookrelay-hitl");
    let kernel = kernel(config(&url, &root))?;

    let record = RawEventRecord::from_value(json!({
        "session_id": "s-42",
        "tool_name": "Bash",
        "tool_input": {"command": "make deploy-prod"}
    }));
    let response = kernel.handle(HookEventType::PreToolUse, record).await;

    assert_eq!(response, HookResponse::deny("Production deploys need sign-off"));
    assert_eq!(*collector.checks.lock(), 1);
    assert!(collector.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn reviewer_approval_relays_the_call() -> Result<()> {
    let (url, collector) = spawn_server(
        json!({"action": "intercept", "intercept_id": "icpt-2"}),
        "approved",
    )
    .await?;
    let root = unique_test_root("hookrelay-approve");
    let kernel = kernel(config(&url, &root))?;

    let record = RawEventRecord::from_value(json!({
        "session_id": "s-1",
        "tool_name": "Bash",
        "tool_input": {"command": "make deploy-staging"}
    }));
    let response = kernel.handle(HookEventType::PreToolUse, record).await;

    assert_eq!(response, HookResponse::Proceed);
    assert_eq!(collector.of_type("PreToolUse").len(), 1);
    Ok(())
}

#[tokio::test]
async fn envelope_wire_shape() -> Result<()> {
    let (url, collector) = spawn_server(json!({}), "approved").await?;
    let root = unique_test_root("hookrelay-wire");
    let kernel = kernel(RelayConfig {
        hitl_enabled: false,
        ..config(&url, &root)
    }
    .with_tags(["ci", "nightly"]))?;

    let record =
        RawEventRecord::parse(r#"{"session_id": "s-9", "source": "startup", "cwd": "/repo"}"#);
    let response = kernel.handle(HookEventType::SessionStart, record).await;
    assert_eq!(response, HookResponse::Proceed);

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["event_type"], "SessionStart");
    assert_eq!(event["session_id"], "s-9");
    assert_eq!(event["trace_id"], "s-9");
    assert_eq!(event["parent_session_id"], Value::Null);
    assert_eq!(event["source_app"], "pipeline-tests");
    assert_eq!(event["tags"], json!(["ci", "nightly"]));
    assert_eq!(event["payload"], json!({"source": "startup", "cwd": "/repo"}));
    assert!(event["timestamp"].as_u64().unwrap() > 0);
    Ok(())
}

#[tokio::test]
async fn stop_respects_the_marker_file() -> Result<()> {
    let (url, collector) = spawn_server(json!({}), "approved").await?;
    let root = unique_test_root("hookrelay-stop");
    std::fs::create_dir_all(&root)?;
    let marker = root.join(STOP_MARKER_FILE);
    let kernel = kernel(config(&url, &root))?;

    // Another end-of-turn sequence holds the marker.
    std::fs::write(&marker, b"")?;
    let response = kernel
        .handle(HookEventType::Stop, RawEventRecord::new())
        .await;
    assert_eq!(response, HookResponse::Proceed);
    assert!(collector.events().is_empty());
    assert!(marker.exists());

    std::fs::remove_file(&marker)?;
    kernel
        .handle(HookEventType::Stop, RawEventRecord::new().with("session_id", "s-1"))
        .await;
    assert_eq!(collector.of_type("Stop").len(), 1);
    assert!(!marker.exists());

    std::fs::remove_dir_all(root)?;
    Ok(())
}

#[tokio::test]
async fn everything_unreachable_still_completes() -> Result<()> {
    let root = unique_test_root("hookrelay-offline");
    std::fs::create_dir_all(&root)?;
    let kernel = kernel(config(&refused_url()?, &root))?;

    for event_type in HookEventType::ALL {
        let record = RawEventRecord::from_value(json!({
            "session_id": "s-1",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        }));
        let response = kernel.handle(event_type, record).await;
        match event_type {
            HookEventType::PreCompact => {
                assert_eq!(response, HookResponse::compact_instructions());
            }
            _ => assert_eq!(response, HookResponse::Proceed),
        }
    }
    assert!(!root.join(STOP_MARKER_FILE).exists());

    std::fs::remove_dir_all(root)?;
    Ok(())
}
