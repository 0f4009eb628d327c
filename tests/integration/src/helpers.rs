//! Test helpers for integration tests
//!
//! Provides the mock platform server, a recording message handler and
//! polling utilities.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_common::{GatewayConfig, PlatformClient, PlatformConfig};
use bridge_gateway::client::HttpDiscovery;
use bridge_gateway::connection::{FileSessionStore, SessionStore};
use bridge_gateway::events::ApplicationFrame;
use bridge_gateway::handlers::MessageHandler;
use bridge_gateway::{GatewayClient, GatewayHandle};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::fixtures::{hello, unique_suffix, ConnectionScript};

/// Token the mock expects in `Authorization: Bot <token>`
pub const TEST_TOKEN: &str = "test-token";

/// One WebSocket connection accepted by the mock gateway
#[derive(Debug, Clone, Default)]
pub struct ConnectionRecord {
    /// Query string of the upgrade request
    pub query: HashMap<String, String>,
    /// Frames received from the client, decoded
    pub received: Vec<Value>,
}

/// One call to the mock message API
#[derive(Debug, Clone)]
pub struct ApiRequestRecord {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Recorded {
    scripts: VecDeque<ConnectionScript>,
    connections: Vec<ConnectionRecord>,
    api_responses: VecDeque<Value>,
    api_requests: Vec<ApiRequestRecord>,
    discovery_calls: Vec<Option<String>>,
    forwarded: Vec<Value>,
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    auto_pong: Arc<AtomicBool>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockState {
    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        let mut recorded = self.recorded.lock().unwrap();
        f(&mut recorded)
    }
}

/// In-process stand-in for the platform
pub struct MockPlatform {
    pub addr: SocketAddr,
    state: MockState,
    _handle: JoinHandle<()>,
}

impl MockPlatform {
    /// Start the mock on an ephemeral port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let state = MockState {
            addr,
            auto_pong: Arc::new(AtomicBool::new(true)),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        };

        let app = Router::new()
            .route("/api/v3/gateway/index", get(discovery))
            .route("/api/v3/message/create", post(message_api))
            .route("/api/v3/message/update", post(message_api))
            .route("/forward", post(forward))
            .route("/gateway", get(gateway))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_base_url(&self) -> String {
        format!("{}/api/v3", self.base_url())
    }

    /// Platform settings pointing at the mock
    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            api_base_url: self.api_base_url(),
            token: TEST_TOKEN.to_string(),
            ..PlatformConfig::default()
        }
    }

    /// Queue the behaviour of the next accepted connection.
    ///
    /// Unscripted connections receive an accepted hello.
    pub fn script_connection(&self, script: ConnectionScript) {
        self.state.with(|r| r.scripts.push_back(script));
    }

    /// Queue the body returned by the next message API call
    pub fn script_api_response(&self, body: Value) {
        self.state.with(|r| r.api_responses.push_back(body));
    }

    /// Answer heartbeats with pongs (on by default)
    pub fn set_auto_pong(&self, enabled: bool) {
        self.state.auto_pong.store(enabled, Ordering::SeqCst);
    }

    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.state.with(|r| r.connections.clone())
    }

    pub fn api_requests(&self) -> Vec<ApiRequestRecord> {
        self.state.with(|r| r.api_requests.clone())
    }

    /// `Authorization` header of every discovery call
    pub fn discovery_calls(&self) -> Vec<Option<String>> {
        self.state.with(|r| r.discovery_calls.clone())
    }

    pub fn forwarded(&self) -> Vec<Value> {
        self.state.with(|r| r.forwarded.clone())
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn discovery(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    state.with(|r| r.discovery_calls.push(authorization(&headers)));
    Json(json!({
        "code": 0,
        "message": "操作成功",
        "data": {"url": format!("ws://{}/gateway?compress=1", state.addr)},
    }))
}

async fn message_api(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let path = uri.path().to_string();
    let is_update = path.ends_with("/update");
    let response = state.with(|r| {
        r.api_requests.push(ApiRequestRecord {
            path,
            authorization: authorization(&headers),
            body,
        });
        r.api_responses.pop_front()
    });

    // Updates answer with an empty data object
    let data = if is_update {
        json!({})
    } else {
        json!({"msg_id": format!("k-{}", unique_suffix())})
    };
    Json(response.unwrap_or_else(|| json!({"code": 0, "message": "操作成功", "data": data})))
}

async fn forward(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.with(|r| r.forwarded.push(body));
    Json(json!({"code": 0, "message": "", "data": {"msg_id": "forwarded"}}))
}

async fn gateway(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_connection(state, query, socket))
}

async fn serve_connection(state: MockState, query: HashMap<String, String>, socket: WebSocket) {
    let (index, script) = state.with(|r| {
        r.connections.push(ConnectionRecord {
            query,
            received: Vec::new(),
        });
        let index = r.connections.len() - 1;
        let script = r.scripts.pop_front().unwrap_or_else(|| {
            ConnectionScript::new().frame(hello(&format!("mock-session-{index}")))
        });
        (index, script)
    });

    let (mut sink, mut stream) = socket.split();

    for frame in &script.frames {
        if sink.send(Message::Binary(zlib(frame))).await.is_err() {
            return;
        }
    }
    if script.close_after {
        let _ = sink.close().await;
        return;
    }

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let is_ping = frame["s"] == 2;
        state.with(|r| r.connections[index].received.push(frame));

        if is_ping
            && state.auto_pong.load(Ordering::SeqCst)
            && sink.send(Message::Binary(zlib(&json!({"s": 3})))).await.is_err()
        {
            return;
        }
    }
}

/// zlib-compress a frame the way the gateway does
pub fn zlib(frame: &Value) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(frame.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap()
}

// ============================================================================
// Message handler
// ============================================================================

/// Handler that records every frame it is given
#[derive(Default)]
pub struct RecordingHandler {
    frames: Mutex<Vec<ApplicationFrame>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<ApplicationFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn sequences(&self) -> Vec<Option<u64>> {
        self.frames().iter().map(|f| f.sequence).collect()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, frame: ApplicationFrame) {
        self.frames.lock().unwrap().push(frame);
    }
}

// ============================================================================
// Gateway client
// ============================================================================

/// A gateway client running against the mock
pub struct RunningGateway {
    pub handle: GatewayHandle,
    pub store: Arc<FileSessionStore>,
    task: JoinHandle<()>,
}

impl RunningGateway {
    /// Request shutdown and wait for the client to stop
    pub async fn stop(self) -> Result<()> {
        self.handle.shutdown();
        tokio::time::timeout(WAIT, self.task).await??;
        Ok(())
    }
}

/// Start a client that discovers its endpoint through the mock
pub async fn spawn_gateway(
    mock: &MockPlatform,
    config: GatewayConfig,
    handler: Arc<dyn MessageHandler>,
) -> Result<RunningGateway> {
    let platform = PlatformClient::new(&mock.platform_config())?;
    let discovery = Arc::new(HttpDiscovery::new(platform, config.compress));
    let store = Arc::new(FileSessionStore::new(config.session_file.clone()));

    let client = GatewayClient::new(
        config,
        discovery,
        Arc::clone(&store) as Arc<dyn SessionStore>,
        handler,
    )
    .await;
    let handle = client.handle();
    let task = tokio::spawn(client.run());

    Ok(RunningGateway {
        handle,
        store,
        task,
    })
}

// ============================================================================
// Polling
// ============================================================================

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Default wait for asynchronous effects
pub const WAIT: Duration = Duration::from_secs(5);
