use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, sleep};
use tokio_stream::wrappers::ReceiverStream;

pub const PATH_CHAT_COMPLETIONS: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_bearer_token: Arc<AtomicU64>,
    saw_include_usage: Arc<AtomicU64>,
    saw_event_stream_accept: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_bearer_token(&self) -> u64 {
        self.saw_bearer_token.load(Ordering::Relaxed)
    }

    pub fn saw_include_usage(&self) -> u64 {
        self.saw_include_usage.load(Ordering::Relaxed)
    }

    pub fn saw_event_stream_accept(&self) -> u64 {
        self.saw_event_stream_accept.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub chat_completions: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            chat_completions: format!("{base_url}{PATH_CHAT_COMPLETIONS}"),
            base_url,
        }
    }

    /// Chat completions endpoint with stream-shaping query parameters, e.g. `"chunks=3&usage=false"`.
    pub fn chat_with(&self, query: &str) -> String {
        format!("{}?{query}", self.chat_completions)
    }
}

/// Stream shaping knobs, taken from the query string.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StreamParams {
    /// Number of content chunks.
    chunks: u32,
    /// Pause before every chunk.
    delay_ms: u64,
    /// Send a trailing usage chunk.
    usage: bool,
    /// Terminate with `data: [DONE]`.
    done: bool,
    /// Spread each JSON payload over two `data:` lines.
    split: bool,
    /// Stop sending after the first chunk but keep the connection open.
    stall: bool,
    /// Size in bytes of the first chunk's content; zero keeps the regular content.
    big: usize,
    /// Respond with this status and a JSON error body instead of streaming.
    status: Option<u16>,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            chunks: 5,
            delay_ms: 0,
            usage: true,
            done: true,
            split: false,
            stall: false,
            big: 0,
            status: None,
        }
    }
}

fn chunk_text(params: &StreamParams, i: u32) -> String {
    if i == 0 && params.big > 0 {
        return "x".repeat(params.big);
    }
    format!("tok{i} ")
}

fn sse_frame(payload: &str, split: bool) -> String {
    match payload.find("[{") {
        Some(idx) if split => format!(
            "data: {}\ndata: {}\n\n",
            &payload[..idx + 1],
            &payload[idx + 1..]
        ),
        _ => format!("data: {payload}\n\n"),
    }
}

fn content_chunk(model: &str, text: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{ "index": 0, "delta": { "content": text }, "finish_reason": null }],
    })
    .to_string()
}

async fn stream_completion(
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    params: StreamParams,
    model: String,
) {
    let send = |frame: String| {
        let tx = tx.clone();
        async move { tx.send(Ok(Bytes::from(frame))).await.is_ok() }
    };

    if !send(": keep-alive\n\n".to_string()).await {
        return;
    }

    let role = serde_json::json!({
        "choices": [{ "index": 0, "delta": { "role": "assistant" } }],
    })
    .to_string();
    if !send(sse_frame(&role, params.split)).await {
        return;
    }

    for i in 0..params.chunks {
        if params.delay_ms > 0 {
            sleep(Duration::from_millis(params.delay_ms)).await;
        }
        let payload = content_chunk(&model, &chunk_text(&params, i));
        if !send(sse_frame(&payload, params.split)).await {
            return;
        }

        if params.stall {
            // Hold the connection until the client goes away.
            while !tx.is_closed() {
                sleep(Duration::from_millis(20)).await;
            }
            return;
        }
    }

    let finish = serde_json::json!({
        "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }],
    })
    .to_string();
    if !send(sse_frame(&finish, params.split)).await {
        return;
    }

    if params.usage {
        let usage = serde_json::json!({
            "choices": [],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": params.chunks,
                "total_tokens": 10 + params.chunks,
            },
        })
        .to_string();
        if !send(format!("data: {usage}\n\n")).await {
            return;
        }
    }

    if params.done {
        let _ = send("data: [DONE]\n\n".to_string()).await;
    }
}

async fn handle_chat_completions(
    State(stats): State<TestServerStats>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    TestServerStats::inc(&stats.requests_total);

    if headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "))
    {
        TestServerStats::inc(&stats.saw_bearer_token);
    }
    if headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
    {
        TestServerStats::inc(&stats.saw_event_stream_accept);
    }

    let req: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };
    if req["stream_options"]["include_usage"] == serde_json::Value::Bool(true) {
        TestServerStats::inc(&stats.saw_include_usage);
    }

    if let Some(status) = params.status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"error":{"message":"injected failure"}}"#,
        )
            .into_response();
    }

    let model = req["model"].as_str().unwrap_or("unknown").to_string();
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(stream_completion(tx, params, model));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_CHAT_COMPLETIONS, post(handle_chat_completions))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();

        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
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

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
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
