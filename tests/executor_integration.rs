//! Integration tests for the executor agent.
//!
//! Each test spins up two Axum servers on random ports: the agent under
//! test and a stub admin center that records registrations and callbacks.
//! Requests go over real TCP so the JSON contract is exercised end to end.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use xxl_agent::config::ExecutorConfig;
use xxl_agent::executor::Executor;
use xxl_agent::protocol::ACCESS_TOKEN_HEADER;

/// Maximum time any wait loop is allowed before the test is considered hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub admin center recording everything the agent sends it.
#[derive(Clone, Default)]
struct SchedulerStub {
    registrations: Arc<Mutex<Vec<Value>>>,
    removals: Arc<Mutex<Vec<Value>>>,
    callbacks: Arc<Mutex<Vec<Value>>>,
}

impl SchedulerStub {
    /// Serve the stub on a random port; returns its base URL.
    async fn start(&self) -> String {
        async fn record(
            State(sink): State<Arc<Mutex<Vec<Value>>>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            sink.lock().await.push(body);
            Json(json!({"code": 200}))
        }

        let app = Router::new()
            .route(
                "/api/registry",
                axum::routing::post(record).with_state(Arc::clone(&self.registrations)),
            )
            .route(
                "/api/registryRemove",
                axum::routing::post(record).with_state(Arc::clone(&self.removals)),
            )
            .route(
                "/api/callback",
                axum::routing::post(record).with_state(Arc::clone(&self.callbacks)),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Wait until a callback for `log_id` arrives and return it.
    async fn wait_for_callback(&self, log_id: i64) -> Value {
        let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
        loop {
            {
                let callbacks = self.callbacks.lock().await;
                for batch in callbacks.iter() {
                    for cb in batch.as_array().into_iter().flatten() {
                        if cb["logId"] == json!(log_id) {
                            return cb.clone();
                        }
                    }
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no callback for logId {log_id} within {TEST_TIMEOUT:?}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn callback_count(&self) -> usize {
        self.callbacks
            .lock()
            .await
            .iter()
            .map(|batch| batch.as_array().map_or(0, Vec::len))
            .sum()
    }
}

/// Start an agent wired to `server_addr` with the standard test handlers.
async fn start_agent(server_addr: &str, access_token: Option<&str>) -> (u16, Arc<Executor>) {
    let config = ExecutorConfig {
        server_addr: server_addr.to_string(),
        access_token: access_token.map(SecretString::from),
        registry_key: "test-executor".to_string(),
        registry_interval: Duration::from_millis(50),
        client_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let executor = Arc::new(Executor::new(config).unwrap());

    executor
        .register_fn("ok", |ctx| async move {
            Ok(format!("ok: {}", ctx.params.executor_params))
        })
        .await;
    executor
        .register_fn("fail", |_ctx| async { Err("handler says no".into()) })
        .await;
    executor
        .register_fn("panic", |_ctx| async { panic!("handler exploded") })
        .await;
    executor
        .register_fn("wait_for_cancel", |ctx| async move {
            ctx.cancelled().await;
            Err("cancelled".into())
        })
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = executor.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (port, executor)
}

/// POST a JSON body to the agent, returning (status, parsed body).
async fn post(port: u16, path: &str, body: Value) -> (u16, Value) {
    post_with_headers(port, path, body, &[]).await
}

async fn post_with_headers(
    port: u16,
    path: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut request = client
        .post(format!("http://127.0.0.1:{port}{path}"))
        .json(&body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

fn trigger(job_id: i64, handler: &str, strategy: &str) -> Value {
    json!({
        "jobId": job_id,
        "executorHandler": handler,
        "executorParams": "p",
        "executorBlockStrategy": strategy,
        "logId": job_id * 100,
        "logDateTime": 1735689600000i64,
    })
}

// ── Dispatch and callback ───────────────────────────────────────────────

#[tokio::test]
async fn run_accepts_and_reports_success() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(port, "/run", trigger(1, "ok", "DISCARD_LATER")).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);

    let cb = stub.wait_for_callback(100).await;
    assert_eq!(cb["handleCode"], 200);
    assert_eq!(cb["handleMsg"], "ok: p");
    assert_eq!(cb["logDateTim"], 1735689600000i64);
}

#[tokio::test]
async fn handler_failure_reported_in_callback() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, _body) = post(port, "/run", trigger(2, "fail", "DISCARD_LATER")).await;
    assert_eq!(status, 200);

    let cb = stub.wait_for_callback(200).await;
    assert_eq!(cb["handleCode"], 500);
    assert_eq!(cb["handleMsg"], "handler says no");
}

#[tokio::test]
async fn unknown_handler_rejected_without_callback() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(port, "/run", trigger(3, "missing", "DISCARD_LATER")).await;
    assert_eq!(status, 500);
    // Body is a one-element callback array carrying the reason.
    assert_eq!(body[0]["handleCode"], 500);
    assert_eq!(body[0]["handleMsg"], "task not registered");

    // No asynchronous callback is ever sent for a rejected dispatch.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stub.callback_count().await, 0);
}

#[tokio::test]
async fn malformed_run_body_rejected() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{port}/run"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body[0]["handleMsg"], "params err");
}

// ── Blocking strategies ─────────────────────────────────────────────────

#[tokio::test]
async fn serial_execution_rejects_while_running() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(port, "/run", trigger(4, "wait_for_cancel", "SERIAL_EXECUTION")).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);

    // Second dispatch for the same job: rejected, HTTP 200 + callback array.
    let (status, body) = post(port, "/run", trigger(4, "wait_for_cancel", "SERIAL_EXECUTION")).await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["handleCode"], 500);
    assert_eq!(body[0]["handleMsg"], "task already running");

    // First task still completes normally once killed.
    let (status, body) = post(port, "/kill", json!({"jobId": 4})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
    let cb = stub.wait_for_callback(400).await;
    assert_eq!(cb["handleCode"], 500);
    assert_eq!(cb["handleMsg"], "cancelled");
}

#[tokio::test]
async fn cover_early_replaces_running_task() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, executor) = start_agent(&addr, None).await;

    let (status, _) = post(port, "/run", trigger(5, "wait_for_cancel", "COVER_EARLY")).await;
    assert_eq!(status, 200);
    let old = executor.running_tasks().get(5).await.unwrap();

    let (status, body) = post(port, "/run", trigger(5, "wait_for_cancel", "COVER_EARLY")).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);

    // Old task cancelled; idleBeat reflects the new task as busy.
    assert!(old.is_cancelled());
    let (status, body) = post(port, "/idleBeat", json!({"jobId": 5})).await;
    assert_eq!(status, 500);
    assert_eq!(body["code"], 500);

    // Old task reports, but never success.
    let cb = stub.wait_for_callback(500).await;
    assert_eq!(cb["handleCode"], 500);

    post(port, "/kill", json!({"jobId": 5})).await;
}

#[tokio::test]
async fn concurrent_same_job_dispatches_accept_exactly_one() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        handles.push(tokio::spawn(async move {
            let (_, body) = post(port, "/run", trigger(6, "wait_for_cancel", "DISCARD_LATER")).await;
            body["code"] == json!(200)
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);

    post(port, "/kill", json!({"jobId": 6})).await;
}

// ── Panic containment ───────────────────────────────────────────────────

#[tokio::test]
async fn handler_panic_contained_and_agent_survives() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, _) = post(port, "/run", trigger(7, "panic", "DISCARD_LATER")).await;
    assert_eq!(status, 200);

    let cb = stub.wait_for_callback(700).await;
    assert_eq!(cb["handleCode"], 500);
    assert!(cb["handleMsg"].as_str().unwrap().contains("task panic"));
    assert!(cb["handleMsg"].as_str().unwrap().contains("handler exploded"));

    // The agent keeps serving and accepting work.
    let (status, body) = post(port, "/beat", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
    let (status, _) = post(port, "/run", trigger(8, "ok", "DISCARD_LATER")).await;
    assert_eq!(status, 200);
    stub.wait_for_callback(800).await;
}

// ── Kill and idleBeat ───────────────────────────────────────────────────

#[tokio::test]
async fn kill_unknown_job_reports_not_running() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(port, "/kill", json!({"jobId": 999})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 500);
}

#[tokio::test]
async fn idle_beat_idle_job_is_200() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(port, "/idleBeat", json!({"jobId": 12})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
}

// ── Log endpoint ────────────────────────────────────────────────────────

#[tokio::test]
async fn log_endpoint_uses_default_query() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, None).await;

    let (status, body) = post(
        port,
        "/log",
        json!({"logDateTim": 1, "logId": 2, "fromLineNum": 1}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
    assert_eq!(body["content"]["fromLineNum"], 1);
    assert_eq!(body["content"]["isEnd"], true);
}

// ── Auth ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn access_token_required_when_configured() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (port, _executor) = start_agent(&addr, Some("sekrit")).await;

    // Missing token.
    let (status, body) = post(port, "/beat", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 500);
    assert_eq!(body["msg"], "access token mismatch");

    // Wrong token.
    let (_, body) =
        post_with_headers(port, "/beat", json!({}), &[(ACCESS_TOKEN_HEADER, "wrong")]).await;
    assert_eq!(body["code"], 500);

    // Correct token.
    let (status, body) =
        post_with_headers(port, "/beat", json!({}), &[(ACCESS_TOKEN_HEADER, "sekrit")]).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
}

// ── Registration lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn registration_heartbeat_and_deregistration() {
    let stub = SchedulerStub::default();
    let addr = stub.start().await;
    let (_port, executor) = start_agent(&addr, None).await;

    executor.start();

    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    loop {
        if stub.registrations.lock().await.len() >= 2 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no heartbeats seen");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let registration = stub.registrations.lock().await[0].clone();
    assert_eq!(registration["registryGroup"], "EXECUTOR");
    assert_eq!(registration["registryKey"], "test-executor");
    assert!(
        registration["registryValue"]
            .as_str()
            .unwrap()
            .starts_with("http://")
    );

    executor.stop().await;
    assert_eq!(stub.removals.lock().await.len(), 1);

    // Loop has stopped: no further heartbeats arrive.
    let count = stub.registrations.lock().await.len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stub.registrations.lock().await.len(), count);
}

// ── Known gap: callbacks are best-effort ────────────────────────────────

/// Callback delivery has no retry and no durable queue: when the admin
/// center is unreachable the outcome is silently lost, while the agent
/// itself carries on unaffected. This pins that accepted gap.
#[tokio::test]
async fn callback_loss_on_dead_scheduler_is_silent() {
    // Grab a port and immediately drop the listener so nothing answers.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = format!("http://{}", dead.local_addr().unwrap());
    drop(dead);

    let (port, executor) = start_agent(&dead_addr, None).await;

    let (status, body) = post(port, "/run", trigger(20, "ok", "DISCARD_LATER")).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);

    // The task finishes and leaves the table even though its callback died.
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while executor.running_tasks().get(20).await.is_some() {
        assert!(tokio::time::Instant::now() < deadline, "task never drained");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Agent still alive and accepting.
    let (status, body) = post(port, "/beat", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
}
