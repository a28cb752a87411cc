//! A fake chat-bot API that accepts `POST /bot/<method>` with a `{chat_id, text}` JSON body.
//!
//! Only `sendMessage` is known; other methods answer 404. Latency and injected failures are
//! configurable through [`Behavior`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_BOT: &str = "/bot";
pub const METHOD_SEND_MESSAGE: &str = "sendMessage";

/// How the fake API answers `sendMessage`.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Artificial processing time per request.
    pub latency: Duration,
    /// When set, every n-th request (1-based) answers 500.
    pub fail_every: Option<u64>,
    /// When set, every request answers with this status instead of 200.
    pub status: Option<u16>,
}

impl Behavior {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn failing_every(n: u64) -> Self {
        Self {
            fail_every: Some(n),
            ..Self::default()
        }
    }

    pub fn always_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    messages_total: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl TestServerStats {
    fn inc_requests_total(&self) -> u64 {
        self.requests_total.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_message(&self, text: String) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
        self.texts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text);
    }

    fn inc_saw_json_content_type(&self) {
        self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Requests that carried a well-formed `{chat_id, text}` body.
    pub fn messages_total(&self) -> u64 {
        self.messages_total.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }

    /// Message texts in arrival order.
    pub fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    behavior: Arc<Behavior>,
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    chat_id: serde_json::Value,
    text: String,
}

async fn handle_method(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let n = state.stats.inc_requests_total();

    if headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
    {
        state.stats.inc_saw_json_content_type();
    }

    if method != METHOD_SEND_MESSAGE {
        return api_error(StatusCode::NOT_FOUND, "Not Found: method not found");
    }

    let msg: SendMessage = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return api_error(StatusCode::BAD_REQUEST, "Bad Request: invalid json"),
    };
    state.stats.record_message(msg.text.clone());

    if !state.behavior.latency.is_zero() {
        sleep(state.behavior.latency).await;
    }

    if let Some(status) = state.behavior.status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !status.is_success() {
            return api_error(status, "injected failure");
        }
    }

    if let Some(every) = state.behavior.fail_every
        && every > 0
        && n % every == 0
    {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }

    let res = json!({
        "ok": true,
        "result": {
            "message_id": n,
            "chat": { "id": msg.chat_id },
            "text": msg.text,
        }
    });
    (StatusCode::OK, res.to_string())
}

fn api_error(status: StatusCode, description: &str) -> (StatusCode, String) {
    let res = json!({
        "ok": false,
        "error_code": status.as_u16(),
        "description": description,
    });
    (status, res.to_string())
}

async fn handle_health() -> &'static str {
    "ok"
}

pub fn router(stats: TestServerStats, behavior: Behavior) -> Router {
    let state = AppState {
        stats,
        behavior: Arc::new(behavior),
    };
    Router::new()
        .route("/health", get(handle_health))
        .route(&format!("{PATH_BOT}/{{method}}"), post(handle_method))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    bot_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), behavior);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let bot_url = format!("{base_url}{PATH_BOT}");

        Ok(Self {
            addr,
            base_url,
            bot_url,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base url to configure as the bot url; the api method is appended to it.
    pub fn bot_url(&self) -> &str {
        &self.bot_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
