//! Mock OpenAI-compatible backend for integration tests
//!
//! Replays a scripted list of SSE `data:` payloads for streaming requests
//! and a fixed completion for non-streaming ones.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Text returned for non-streaming completions
pub const COMPLETION_TEXT: &str = "Hello from the mock provider";

/// How the scripted SSE body ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Send `data: [DONE]` and close
    Done,
    /// Close without the sentinel
    Close,
    /// Keep the connection open forever
    Stall,
}

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these payloads, then end as given
    Events { data: Vec<String>, end: StreamEnd },
    /// Reject every request with this status and body
    Status(u16, &'static str),
}

impl Script {
    /// Answer arriving as incremental `delta.content` pieces
    pub fn deltas(pieces: &[&str]) -> Self {
        let mut data: Vec<String> = pieces.iter().map(|p| delta_chunk(p)).collect();
        data.push(finish_chunk("stop"));
        Self::Events {
            data,
            end: StreamEnd::Done,
        }
    }

    /// Answer arriving as cumulative `message.content` snapshots
    pub fn snapshots(snapshots: &[&str]) -> Self {
        let mut data: Vec<String> = snapshots.iter().map(|s| snapshot_chunk(s)).collect();
        data.push(finish_chunk("stop"));
        Self::Events {
            data,
            end: StreamEnd::Done,
        }
    }

    /// Raw payloads ending as given
    pub const fn raw(data: Vec<String>, end: StreamEnd) -> Self {
        Self::Events { data, end }
    }
}

pub fn delta_chunk(content: &str) -> String {
    json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": content}}]}).to_string()
}

pub fn reasoning_chunk(reasoning: &str) -> String {
    json!({"choices": [{"index": 0, "delta": {"reasoning_content": reasoning}}]}).to_string()
}

pub fn snapshot_chunk(content: &str) -> String {
    json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]}).to_string()
}

pub fn finish_chunk(reason: &str) -> String {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]}).to_string()
}

/// Mock backend serving `/v1/chat/completions`
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    script: Script,
    request_count: AtomicU32,
    last_request: Mutex<Option<Value>>,
}

impl MockUpstream {
    /// Start the mock, returning once it is listening
    pub async fn start(script: Script) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            script,
            request_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to configure as the relay provider (includes `/v1`)
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of completion requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent completion request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let streaming = body["stream"].as_bool().unwrap_or(false);
    *state.last_request.lock().unwrap() = Some(body);

    let (data, end) = match &state.script {
        Script::Status(status, message) => {
            let status = StatusCode::from_u16(*status).unwrap();
            return (status, *message).into_response();
        }
        Script::Events { data, end } => (data.clone(), *end),
    };

    if !streaming {
        return Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": "mock-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": COMPLETION_TEXT},
                "finish_reason": "stop"
            }]
        }))
        .into_response();
    }

    let mut frames: Vec<Bytes> = data.into_iter().map(|d| Bytes::from(format!("data: {d}\n\n"))).collect();
    if end == StreamEnd::Done {
        frames.push(Bytes::from_static(b"data: [DONE]\n\n"));
    }

    let scripted = stream::iter(frames).map(Ok::<_, Infallible>);
    let body: BoxStream<'static, Result<Bytes, Infallible>> = if end == StreamEnd::Stall {
        scripted.chain(stream::pending()).boxed()
    } else {
        scripted.boxed()
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(body))
        .unwrap()
}
