use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use stagewatch_client::{
    run_socket_session, run_watch, BackendError, RunAck, RunBackend, SessionEnd, SessionOptions,
    WatchRuntimeConfig,
};
use stagewatch_protocol::{
    ResultsSnapshot, RunSummary, StartRunRequest, StatusSnapshot, TestKey, TestType,
};
use stagewatch_state::{EventIngress, ExecutionStatus, RunPhase, SlotStatus};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const OPEN_FRAME: &str =
    r#"0{"sid":"it","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

#[derive(Debug, Clone)]
enum ServerStep {
    Send(String),
    Expect(&'static str),
    Close,
}

fn send(frame: impl Into<String>) -> ServerStep {
    ServerStep::Send(frame.into())
}

fn event(name: &str, payload: Value) -> ServerStep {
    ServerStep::Send(format!("42{}", json!([name, payload])))
}

fn handshake() -> Vec<ServerStep> {
    vec![
        send(OPEN_FRAME),
        ServerStep::Expect("40"),
        send(r#"40{"sid":"ns-it"}"#),
    ]
}

/// Serves one scripted connection per script, in order, and returns every
/// text frame each client sent.
async fn spawn_socket_server(
    scripts: Vec<Vec<ServerStep>>,
) -> (String, JoinHandle<Vec<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind socket server");
    let address = listener.local_addr().expect("server address");
    let handle = tokio::spawn(async move {
        let mut transcripts = Vec::new();
        for script in scripts {
            let (stream, _) = listener.accept().await.expect("accept connection");
            let mut socket = accept_async(stream).await.expect("websocket handshake");
            let mut received = Vec::new();
            for step in script {
                match step {
                    ServerStep::Send(frame) => {
                        socket
                            .send(Message::text(frame))
                            .await
                            .expect("server send");
                    }
                    ServerStep::Expect(expected) => loop {
                        let message = socket
                            .next()
                            .await
                            .expect("client frame")
                            .expect("client frame readable");
                        if let Message::Text(text) = message {
                            received.push(text.as_str().to_string());
                            assert_eq!(text.as_str(), expected);
                            break;
                        }
                    },
                    ServerStep::Close => {
                        let _ = socket.close(None).await;
                    }
                }
            }
            transcripts.push(received);
        }
        transcripts
    });
    (
        format!("ws://{address}/socket.io/?EIO=4&transport=websocket"),
        handle,
    )
}

struct StaticBackend {
    status: StatusSnapshot,
}

#[async_trait]
impl RunBackend for StaticBackend {
    async fn fetch_status(&self) -> Result<StatusSnapshot, BackendError> {
        Ok(self.status.clone())
    }

    async fn fetch_results(&self) -> Result<ResultsSnapshot, BackendError> {
        Ok(ResultsSnapshot::default())
    }

    async fn start_run(&self, _request: &StartRunRequest) -> Result<RunAck, BackendError> {
        Ok(RunAck {
            status: "started".to_string(),
        })
    }

    async fn stop_run(&self) -> Result<RunAck, BackendError> {
        Ok(RunAck {
            status: "stopped".to_string(),
        })
    }

    async fn fetch_report_json(&self) -> Result<Value, BackendError> {
        Ok(json!({}))
    }
}

fn key(index: u64, test_type: TestType) -> TestKey {
    TestKey::new(index, test_type)
}

#[tokio::test]
async fn integration_socket_session_handshakes_heartbeats_and_applies_events() {
    let mut script = handshake();
    script.extend([
        event("test_started", json!({})),
        event("test_start", json!({"index": 0, "type": "inquiry", "text": "price of A"})),
        event(
            "test_detail_update",
            json!({"index": 0, "type": "inquiry", "llm_sentence": "A costs ten."}),
        ),
        send("2"),
        ServerStep::Expect("3"),
        send("42[\"test_result\",{\"result\":"),
        event(
            "test_result",
            json!({"result": {"index": 0, "type": "inquiry", "success": "true", "llm_text": "A costs ten."}}),
        ),
        event(
            "test_completed",
            json!({"summary": {"total": 1, "successful": 1, "failed": 0, "success_rate": 100.0}}),
        ),
    ]);
    let (url, server) = spawn_socket_server(vec![script]).await;

    let mut ingress = EventIngress::new();
    let (_sender, mut shutdown) = watch::channel(false);
    let end = tokio::time::timeout(
        Duration::from_secs(10),
        run_socket_session(
            &url,
            &mut ingress,
            &mut shutdown,
            SessionOptions {
                stop_on_run_end: true,
            },
        ),
    )
    .await
    .expect("session finishes in time")
    .expect("session succeeds");

    assert_eq!(end, SessionEnd::RunFinished);
    let transcripts = server.await.expect("server task");
    assert_eq!(transcripts, vec![vec!["40".to_string(), "3".to_string()]]);

    let state = ingress.state();
    assert_eq!(state.phase(), RunPhase::Completed);
    assert_eq!(
        state.slots().slot_for(&key(0, TestType::Inquiry)).map(|slot| slot.status),
        Some(SlotStatus::Success)
    );
    assert_eq!(ingress.stats().rejected, 1);
}

#[tokio::test]
async fn regression_namespace_connect_error_fails_the_session() {
    let script = vec![
        send(OPEN_FRAME),
        ServerStep::Expect("40"),
        send(r#"44{"message":"not authorized"}"#),
    ];
    let (url, server) = spawn_socket_server(vec![script]).await;

    let mut ingress = EventIngress::new();
    let (_sender, mut shutdown) = watch::channel(false);
    let error = run_socket_session(&url, &mut ingress, &mut shutdown, SessionOptions::default())
        .await
        .expect_err("connect error ends session");

    assert!(error.to_string().contains("not authorized"));
    server.await.expect("server task");
}

#[tokio::test]
async fn integration_watch_reconnects_and_keeps_state_across_sessions() {
    let mut first = handshake();
    first.extend([
        event("test_started", json!({})),
        event("test_start", json!({"index": 1, "type": "compare", "text": "A or B"})),
        event(
            "test_result",
            json!({"result": {"index": 2, "type": "purchase", "success": false, "error": "tts timeout"}}),
        ),
        ServerStep::Close,
    ]);
    let mut second = handshake();
    second.extend([
        event("test_start", json!({"index": 2, "type": "purchase", "text": "buy A"})),
        event(
            "test_result",
            json!({"result": {"index": 1, "type": "compare", "success": true, "llm_text": "A is cheaper."}}),
        ),
        event(
            "test_completed",
            json!({"summary": {"total": 2, "successful": 1, "failed": 1, "success_rate": 50.0}}),
        ),
    ]);
    let (url, server) = spawn_socket_server(vec![first, second]).await;

    let backend = StaticBackend {
        status: StatusSnapshot {
            is_running: true,
            progress: 0,
            total: 2,
            summary: RunSummary::default(),
            ..StatusSnapshot::default()
        },
    };
    let config = WatchRuntimeConfig {
        socket_url: url,
        reconnect_delay: Duration::from_millis(10),
        max_sessions: Some(5),
        exit_on_completion: true,
    };
    let mut ingress = EventIngress::new();
    let (_sender, shutdown) = watch::channel(false);
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        run_watch(&config, &backend, &mut ingress, shutdown),
    )
    .await
    .expect("watch finishes in time")
    .expect("watch succeeds");

    assert_eq!(report.sessions, 2);
    assert_eq!(report.failed_sessions, 0);
    assert!(report.run_finished);
    server.await.expect("server task");

    let state = ingress.state();
    let strip = state
        .slots()
        .slots()
        .iter()
        .map(|slot| (slot.bound_key, slot.status))
        .collect::<Vec<_>>();
    assert_eq!(
        strip,
        vec![
            (key(1, TestType::Compare), SlotStatus::Success),
            (key(2, TestType::Order), SlotStatus::Failed),
        ]
    );
    assert_eq!(
        state
            .registry()
            .get(&key(2, TestType::Order))
            .map(|record| (record.status, record.input_text.as_str())),
        Some((ExecutionStatus::Failed, "buy A"))
    );
    assert_eq!(state.summary().summary.total, 2);
    assert!(state.report_available());
}
