//! In-process OpAMP server and recording callbacks shared by the engine tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use opamp_agent::{Callbacks, Capability};
use opamp_core::error::{ErrorKind, OpampError, Result};
use opamp_core::protocol::codec::{decode_agent_to_server, encode_server_to_agent};
use opamp_core::protocol::{
    AgentConfigMap, AgentToServer, EffectiveConfig, RemoteConfigStatus, ServerToAgent,
};

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(msg: &ServerToAgent) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: encode_server_to_agent(msg).expect("encode reply").to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("status code"),
            headers: Vec::new(),
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn garbage() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: b"\xffdefinitely not cbor".to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub at: Instant,
    pub body: Vec<u8>,
    pub msg: Option<AgentToServer>,
    pub content_type: String,
}

#[derive(Default)]
struct ServerState {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct FakeServer {
    pub url: String,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl FakeServer {
    /// Serve `script` in order, then plain 200s with an empty reply.
    pub async fn start(script: impl IntoIterator<Item = Reply>) -> Self {
        let state = Arc::new(ServerState::default());
        state.script.lock().extend(script);

        let app = Router::new()
            .route("/v1/opamp", post(handle))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            url: format!("http://{addr}/v1/opamp"),
            state,
            task,
        }
    }

    pub fn push(&self, reply: Reply) {
        self.state.script.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` requests arrived.
    pub async fn wait_for_requests(&self, n: usize, within: Duration) -> Vec<Recorded> {
        let deadline = Instant::now() + within;
        loop {
            let seen = self.requests();
            if seen.len() >= n {
                return seen;
            }
            assert!(
                Instant::now() < deadline,
                "expected {n} requests within {within:?}, got {}",
                seen.len()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);

    state.requests.lock().push(Recorded {
        at: Instant::now(),
        body: body.to_vec(),
        msg: decode_agent_to_server(&body).ok(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    });

    let reply = state
        .script
        .lock()
        .pop_front()
        .unwrap_or_else(|| Reply::ok(&ServerToAgent::default()));
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    let mut out = HeaderMap::new();
    for (name, value) in reply.headers {
        out.insert(name, HeaderValue::from_str(&value).expect("header value"));
    }
    (reply.status, out, reply.body).into_response()
}

/// Callbacks that count and keep everything they are given.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub connects: AtomicUsize,
    pub connect_failures: Mutex<Vec<ErrorKind>>,
    pub configs: Mutex<Vec<AgentConfigMap>>,
    pub saved_statuses: Mutex<Vec<RemoteConfigStatus>>,
    pub applied: Mutex<Vec<Capability>>,
}

impl RecordingCallbacks {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> Vec<ErrorKind> {
        self.connect_failures.lock().clone()
    }
}

#[async_trait]
impl Callbacks for RecordingCallbacks {
    async fn on_connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_connect_failed(&self, err: &OpampError) {
        self.connect_failures.lock().push(err.kind());
    }

    async fn on_remote_config(&self, config: &AgentConfigMap) -> Result<()> {
        self.configs.lock().push(config.clone());
        Ok(())
    }

    async fn save_remote_config_status(&self, status: &RemoteConfigStatus) {
        self.saved_statuses.lock().push(status.clone());
    }

    async fn effective_config(&self) -> Option<EffectiveConfig> {
        self.configs
            .lock()
            .last()
            .cloned()
            .map(|config_map| EffectiveConfig { config_map })
    }

    async fn on_message_applied(&self, capability: Capability) {
        self.applied.lock().push(capability);
    }
}
