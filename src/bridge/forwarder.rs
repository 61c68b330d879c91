//! Upstream request forwarding.
//!
//! One POST per inbound message. The upstream may answer with a single JSON
//! body or with an SSE stream; either way the caller receives at most one
//! line of output and never an error. Failures become JSON-RPC error
//! responses for requests and silence for notifications.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::bridge::ndjson::InboundMessage;
use crate::bridge::sse::{SseFrame, SseReassembler};
use crate::config::{BridgeConfig, MAX_MESSAGE_BYTES};
use crate::error::{ConfigError, ForwardError};
use crate::jsonrpc::error_response;

/// `Accept` header advertising both response styles.
pub const ACCEPT_BOTH: &str = "application/json, text/event-stream";

const EVENT_STREAM: &str = "text/event-stream";

/// Forwards messages to the configured endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    config: Arc<BridgeConfig>,
}

impl Forwarder {
    /// Build a forwarder with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the client cannot be built.
    pub fn new(config: Arc<BridgeConfig>) -> Result<Self, ConfigError> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    /// Forward `msg` and return the line to write to stdout, if any.
    ///
    /// Never fails: transport, HTTP and stream errors are turned into error
    /// responses via [`error_response`], which yields `None` for
    /// notifications and `null` ids.
    pub async fn forward(&self, msg: &InboundMessage) -> Option<String> {
        match self.try_forward(msg).await {
            Ok(Some(text)) => Some(text),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    id = ?msg.id,
                    notification = msg.is_notification(),
                    error = %e,
                    "forwarding failed"
                );
                error_response(msg.id.as_ref(), e.jsonrpc_code(), &e.to_string())
            }
        }
    }

    async fn try_forward(&self, msg: &InboundMessage) -> Result<Option<String>, ForwardError> {
        let mut request = self
            .client
            .post(self.config.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_BOTH)
            .body(msg.raw.clone());
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ForwardError::Transport)?;
        let status = response.status();

        if !status.is_success() {
            let body = read_body_prefix(response, MAX_MESSAGE_BYTES).await;
            tracing::warn!(status = status.as_u16(), body = %body, "upstream returned error status");
            return Err(ForwardError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        // A notification never produces output, so its body is not read.
        let Some(id) = &msg.id else {
            tracing::debug!(status = status.as_u16(), "notification delivered");
            return Ok(None);
        };

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        tracing::debug!(
            ?id,
            status = status.as_u16(),
            content_type = %content_type,
            "upstream responded"
        );

        if content_type.contains(EVENT_STREAM) {
            read_event_stream(response, id).await.map(Some)
        } else {
            read_json_body(response).await.map(Some)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Direct JSON Responses
// ─────────────────────────────────────────────────────────────────────────────

async fn read_json_body(response: Response) -> Result<String, ForwardError> {
    let bytes = read_body_limited(response, MAX_MESSAGE_BYTES).await?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    if text.is_empty() {
        return Err(ForwardError::NoValidResponse);
    }
    single_line(text).ok_or(ForwardError::NoValidResponse)
}

/// Keep `text` as-is unless it spans several lines, in which case its line
/// breaks are removed so the output stream stays line-delimited.
///
/// JSON strings cannot hold a raw CR or LF, so in a valid document every
/// line break, and the indentation after it, is insignificant whitespace.
/// All other bytes are left untouched: numbers, escapes and key order
/// reach the client exactly as the server wrote them.
fn single_line(text: &str) -> Option<String> {
    if !text.contains(['\n', '\r']) {
        return Some(text.to_string());
    }
    if let Err(e) = serde_json::from_str::<IgnoredAny>(text) {
        tracing::warn!(error = %e, "multi-line upstream body is not valid JSON");
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut after_break = false;
    for c in text.chars() {
        match c {
            '\n' | '\r' => after_break = true,
            ' ' | '\t' if after_break => {}
            _ => {
                after_break = false;
                out.push(c);
            }
        }
    }
    Some(out)
}

/// Up to `max_bytes` of an error response body, for the error message.
///
/// Whatever arrived before the limit or a failed read is kept.
async fn read_body_prefix(mut response: Response, max_bytes: usize) -> String {
    let mut buf = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = max_bytes - buf.len();
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    tracing::debug!(max_bytes, "error response body truncated");
                    break;
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, read = buf.len(), "error response body cut short");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

async fn read_body_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ForwardError> {
    if response
        .content_length()
        .is_some_and(|len| len as usize > max_bytes)
    {
        return Err(ForwardError::BodyTooLarge { max_bytes });
    }

    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(ForwardError::Stream)? {
        if buf.len() + chunk.len() > max_bytes {
            return Err(ForwardError::BodyTooLarge { max_bytes });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Picks the frame answering a given request id.
///
/// The first frame whose payload `id` equals the request id (type and value)
/// wins. Until then the first valid frame seen is kept as a fallback for
/// servers that do not echo `id` on every frame.
#[derive(Debug)]
pub struct ResponseSelector<'a> {
    id: &'a Value,
    fallback: Option<String>,
}

impl<'a> ResponseSelector<'a> {
    /// Selector for the request with `id`.
    pub fn new(id: &'a Value) -> Self {
        Self { id, fallback: None }
    }

    /// Offer a completed frame; returns its text if it answers the request.
    pub fn offer(&mut self, frame: SseFrame) -> Option<String> {
        let data = frame.data.trim().to_string();
        if frame.payload.get("id") == Some(self.id) {
            return Some(data);
        }
        tracing::debug!(event = ?frame.event, "SSE frame does not match request id");
        if self.fallback.is_none() {
            self.fallback = Some(data);
        }
        None
    }

    /// The fallback frame, once the stream is exhausted.
    pub fn into_fallback(self) -> Option<String> {
        self.fallback
    }
}

async fn read_event_stream(mut response: Response, id: &Value) -> Result<String, ForwardError> {
    let mut reassembler = SseReassembler::new(MAX_MESSAGE_BYTES);
    let mut selector = ResponseSelector::new(id);

    while let Some(chunk) = response.chunk().await.map_err(ForwardError::Stream)? {
        for frame in reassembler.feed(&chunk) {
            if let Some(matched) = selector.offer(frame) {
                // Dropping the response closes the connection mid-stream.
                drop(response);
                tracing::debug!(?id, "matched SSE response, stream closed");
                return Ok(matched);
            }
        }
    }

    if let Some(frame) = reassembler.finish() {
        if let Some(matched) = selector.offer(frame) {
            return Ok(matched);
        }
    }

    match selector.into_fallback() {
        Some(text) => {
            tracing::debug!(?id, "SSE stream ended without id match, using first valid frame");
            Ok(text)
        }
        None => Err(ForwardError::NoValidResponse),
    }
}
