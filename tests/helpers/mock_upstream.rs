//! Mock JSON-RPC upstream for integration testing.
//!
//! Replies are configured per JSON-RPC `method`: a direct JSON body, an SSE
//! stream written in separately delayed chunks, or an HTTP error status.
//! Unconfigured methods echo `{"jsonrpc":"2.0","id":<id>,"result":{"method":..}}`
//! and notifications get `202 Accepted` with an empty body.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing::post,
};
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How the mock answers one method.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `200` with `application/json` and this exact body, after a delay.
    Json { body: String, delay: Duration },
    /// `200` with `text/event-stream`; each chunk is written after its delay.
    Sse {
        chunks: Vec<(Duration, Vec<u8>)>,
        /// Keep the stream open forever after the last chunk.
        hold_open: bool,
    },
    /// Non-2xx status with a plain-text body.
    Status { status: u16, body: String },
}

impl Reply {
    /// Immediate JSON body.
    pub fn json(body: impl Into<String>) -> Self {
        Reply::Json {
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// JSON body sent after `delay`.
    pub fn json_after(delay: Duration, body: impl Into<String>) -> Self {
        Reply::Json {
            body: body.into(),
            delay,
        }
    }

    /// SSE stream of raw chunks written back to back.
    pub fn sse(chunks: &[&str]) -> Self {
        Reply::Sse {
            chunks: chunks
                .iter()
                .map(|c| (Duration::ZERO, c.as_bytes().to_vec()))
                .collect(),
            hold_open: false,
        }
    }

    /// SSE stream whose chunks are spaced out by `gap`.
    pub fn sse_spaced(gap: Duration, chunks: &[&str]) -> Self {
        Reply::Sse {
            chunks: chunks.iter().map(|c| (gap, c.as_bytes().to_vec())).collect(),
            hold_open: false,
        }
    }

    /// SSE stream that never ends after its chunks.
    pub fn sse_held_open(chunks: &[&str]) -> Self {
        match Reply::sse(chunks) {
            Reply::Sse { chunks, .. } => Reply::Sse {
                chunks,
                hold_open: true,
            },
            other => other,
        }
    }

    /// Error status.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Reply::Status {
            status,
            body: body.into(),
        }
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Default)]
struct MockState {
    replies: HashMap<String, Reply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Builder for the mock server.
#[derive(Debug, Default)]
pub struct MockUpstream {
    replies: HashMap<String, Reply>,
}

impl MockUpstream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` with `reply`.
    #[must_use]
    pub fn with_reply(mut self, method: &str, reply: Reply) -> Self {
        self.replies.insert(method.to_string(), reply);
        self
    }

    /// Start serving on an ephemeral port.
    pub async fn start(self) -> MockServerHandle {
        let state = Arc::new(MockState {
            replies: self.replies,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/mcp", post(handle_jsonrpc))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockServerHandle {
            addr,
            state,
            _handle: handle,
        }
    }
}

/// Handle to the running mock server.
pub struct MockServerHandle {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    _handle: JoinHandle<()>,
}

impl MockServerHandle {
    /// Endpoint URL for the bridge.
    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }
}

async fn handle_jsonrpc(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().await.push(RecordedRequest {
        headers,
        body: body.clone(),
    });

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let method = request["method"].as_str().unwrap_or("").to_string();

    match state.replies.get(&method).cloned() {
        Some(Reply::Json { body, delay }) => {
            tokio::time::sleep(delay).await;
            json_response(body)
        }
        Some(Reply::Sse { chunks, hold_open }) => sse_response(chunks, hold_open),
        Some(Reply::Status { status, body }) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(body))
            .unwrap(),
        None => match request.get("id") {
            Some(id) => json_response(
                json!({"jsonrpc": "2.0", "id": id, "result": {"method": method}}).to_string(),
            ),
            None => Response::builder()
                .status(StatusCode::ACCEPTED)
                .body(Body::empty())
                .unwrap(),
        },
    }
}

fn json_response(body: String) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn sse_response(chunks: Vec<(Duration, Vec<u8>)>, hold_open: bool) -> Response {
    let frames = stream::iter(chunks).then(|(delay, bytes)| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, Infallible>(Bytes::from(bytes))
    });
    let body = if hold_open {
        Body::from_stream(frames.chain(stream::pending()))
    } else {
        Body::from_stream(frames)
    };
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap()
}
