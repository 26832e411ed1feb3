//! Backend-poll transport tests against a live status endpoint
//!
//! These run on the real clock with short poll intervals: the paused tokio
//! clock does not mix with actual network round-trips.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use li_flow::geometry::{PopupGeometry, ScreenSize};
use li_flow::url::parse_query;
use li_flow::{
    ContextOpener, Destination, DestinationHandle, ErrorCallback, FlowConfig, FlowOutcome,
    FlowStatus, HostEnvironment, LoginFlow, SuccessCallback, TransportOptions,
};
use li_store::{KeyValueStore, MemoryStore};
use li_types::{codes, AuthFailure, FlowResult};
use parking_lot::Mutex;
use serde_json::json;

/// Scripted status endpoint: serves replies in order, repeating the last one
/// once the script is exhausted, and records every session it was asked for.
struct ScriptedBackend {
    replies: Vec<Reply>,
    hits: AtomicUsize,
    sessions: Mutex<Vec<String>>,
}

#[derive(Clone)]
enum Reply {
    Json(serde_json::Value),
    Status(StatusCode),
}

async fn status_handler(
    State(backend): State<Arc<ScriptedBackend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(session) = params.get("session") {
        backend.sessions.lock().push(session.clone());
    }
    let hit = backend.hits.fetch_add(1, Ordering::SeqCst);
    let reply = backend
        .replies
        .get(hit)
        .or_else(|| backend.replies.last())
        .cloned()
        .unwrap_or(Reply::Status(StatusCode::NOT_FOUND));
    match reply {
        Reply::Json(body) => Json(body).into_response(),
        Reply::Status(status) => status.into_response(),
    }
}

async fn serve(replies: Vec<Reply>) -> (Arc<ScriptedBackend>, String) {
    let backend = Arc::new(ScriptedBackend {
        replies,
        hits: AtomicUsize::new(0),
        sessions: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/auth/status", get(status_handler))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    (backend, format!("http://{addr}/auth/status"))
}

struct PopupOpener {
    urls: Mutex<Vec<String>>,
}

impl ContextOpener for PopupOpener {
    fn open(&self, url: &str, _geometry: Option<&PopupGeometry>) -> FlowResult<Destination> {
        struct OpenHandle;
        impl DestinationHandle for OpenHandle {
            fn is_closed(&self) -> bool {
                false
            }
            fn close(&self) {}
        }
        self.urls.lock().push(url.to_string());
        Ok(Destination::Window(Arc::new(OpenHandle)))
    }
}

struct Backend {
    opener: Arc<PopupOpener>,
    flow: LoginFlow,
    codes: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<Vec<AuthFailure>>>,
    done: Arc<AtomicBool>,
}

fn backend_flow(status_endpoint: &str, max_wait: Duration) -> Backend {
    let opener = Arc::new(PopupOpener {
        urls: Mutex::new(Vec::new()),
    });
    let env = HostEnvironment::new(
        Arc::clone(&opener) as Arc<dyn ContextOpener>,
        Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>,
        "https://app.example",
        ScreenSize::new(1920, 1080),
    );

    let mut config = FlowConfig::new("client123", "https://app.example/cb");
    config.transport = TransportOptions::Backend {
        status_endpoint: status_endpoint.to_string(),
        poll_interval: Duration::from_millis(50),
        max_wait,
    };

    let codes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let failures: Arc<Mutex<Vec<AuthFailure>>> = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicBool::new(false));

    let on_success: Arc<SuccessCallback> = {
        let codes = Arc::clone(&codes);
        let done = Arc::clone(&done);
        Arc::new(move |code| {
            codes.lock().push(code);
            done.store(true, Ordering::SeqCst);
        })
    };
    let on_error: Arc<ErrorCallback> = {
        let failures = Arc::clone(&failures);
        let done = Arc::clone(&done);
        Arc::new(move |failure| {
            failures.lock().push(failure);
            done.store(true, Ordering::SeqCst);
        })
    };

    let flow = LoginFlow::configure(config, &env, on_success, on_error);
    Backend {
        opener,
        flow,
        codes,
        failures,
        done,
    }
}

async fn wait_done(done: &AtomicBool) {
    for _ in 0..200 {
        if done.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("attempt never reached a terminal state");
}

#[tokio::test]
async fn backend_poll_resolves_when_completed() {
    let (backend, endpoint) = serve(vec![
        Reply::Json(json!({"status": "pending"})),
        Reply::Json(json!({"status": "pending"})),
        Reply::Json(json!({"status": "completed", "code": "AQTbackend"})),
    ])
    .await;

    let harness = backend_flow(&endpoint, Duration::from_secs(5));
    harness.flow.login();
    wait_done(&harness.done).await;

    assert_eq!(harness.codes.lock().as_slice(), ["AQTbackend"]);
    assert!(harness.failures.lock().is_empty());
    assert_eq!(
        harness.flow.last_outcome(),
        Some(FlowOutcome::Success {
            code: "AQTbackend".to_string()
        })
    );

    // The wire state carried the session id the server was polled with.
    let polled_session = backend.sessions.lock()[0].clone();
    let urls = harness.opener.urls.lock();
    let wire_state = parse_query(&urls[0]).unwrap().remove("state").unwrap();
    assert!(wire_state.ends_with(&format!(".{polled_session}")));
}

#[tokio::test]
async fn backend_poll_times_out_and_stops() {
    let (backend, endpoint) = serve(vec![Reply::Json(json!({"status": "pending"}))]).await;

    let harness = backend_flow(&endpoint, Duration::from_millis(300));
    harness.flow.login();
    wait_done(&harness.done).await;

    let failures = harness.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, codes::ERR_TIMEOUT);
    drop(failures);
    assert_eq!(harness.flow.status(), FlowStatus::Idle);

    // No stray poller keeps hitting the endpoint after the timeout. A check
    // dropped mid-flight may still land, so let the dust settle first.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits_at_timeout = backend.hits.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.hits.load(Ordering::SeqCst), hits_at_timeout);
}

#[tokio::test]
async fn backend_poll_retries_through_server_errors() {
    let (_backend, endpoint) = serve(vec![
        Reply::Status(StatusCode::INTERNAL_SERVER_ERROR),
        Reply::Status(StatusCode::INTERNAL_SERVER_ERROR),
        Reply::Json(json!({"status": "completed", "code": "AQTflaky"})),
    ])
    .await;

    let harness = backend_flow(&endpoint, Duration::from_secs(5));
    harness.flow.login();
    wait_done(&harness.done).await;

    assert_eq!(harness.codes.lock().as_slice(), ["AQTflaky"]);
    assert!(harness.failures.lock().is_empty());
}

#[tokio::test]
async fn backend_poll_surfaces_server_side_error() {
    let (_backend, endpoint) = serve(vec![Reply::Json(json!({
        "status": "error",
        "error": "access_denied",
        "errorMessage": "User denied access",
    }))])
    .await;

    let harness = backend_flow(&endpoint, Duration::from_secs(5));
    harness.flow.login();
    wait_done(&harness.done).await;

    let failures = harness.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, "access_denied");
    assert_eq!(failures[0].error_message, "User denied access");
}

#[tokio::test]
async fn backend_poll_completed_without_code_is_no_code() {
    let (_backend, endpoint) =
        serve(vec![Reply::Json(json!({"status": "completed"}))]).await;

    let harness = backend_flow(&endpoint, Duration::from_secs(5));
    harness.flow.login();
    wait_done(&harness.done).await;

    let failures = harness.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, codes::ERR_NO_CODE);
}
