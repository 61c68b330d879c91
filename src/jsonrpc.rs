//! Minimal JSON-RPC 2.0 envelope handling.
//!
//! The bridge is a relay, not an interpreter: it only ever looks at the
//! `jsonrpc` and `id` members of a message. Everything else travels as the
//! original text. This module holds the envelope predicate, the error
//! response builder, and the best-effort id recovery used when a line fails
//! to decode.

use serde::Serialize;
use serde_json::Value;

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid request object. Not emitted by the relay,
/// which drops envelope-less messages instead of answering them.
pub const INVALID_REQUEST: i64 = -32600;

/// Internal JSON-RPC error. Used for every transport-level failure.
pub const INTERNAL_ERROR: i64 = -32603;

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` when `value` is an object carrying a `jsonrpc` member.
///
/// The value of `jsonrpc` is deliberately not checked, and neither are
/// `method`, `params`, `result` or `error`.
pub fn is_forwardable(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("jsonrpc"))
}

/// Extract the `id` member exactly as sent.
///
/// `None` means the member is absent (a notification). `Some(Value::Null)`
/// is a request with a null id.
pub fn message_id(value: &Value) -> Option<Value> {
    value.as_object()?.get("id").cloned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Synthesizer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    jsonrpc: &'static str,
    id: &'a Value,
    error: ErrorObject<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorObject<'a> {
    code: i64,
    message: &'a str,
}

/// Build the wire text of a JSON-RPC error response for `id`.
///
/// Returns `None` when there is nobody to answer: the id is absent
/// (notification) or `null` (uncorrelatable). The id is copied as-is, so a
/// numeric id stays numeric and a string id stays a string.
pub fn error_response(id: Option<&Value>, code: i64, message: &str) -> Option<String> {
    let id = id.filter(|id| !id.is_null())?;
    let response = ErrorResponse {
        jsonrpc: "2.0",
        id,
        error: ErrorObject { code, message },
    };
    match serde_json::to_string(&response) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize error response");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Id Recovery
// ─────────────────────────────────────────────────────────────────────────────

/// Best-effort recovery of a request id from text that failed to decode.
///
/// Looks for an `"id"` key at nesting depth one (ignoring anything inside
/// string literals) and decodes the single value following its colon. Only
/// numbers and strings are accepted. Truncated or garbled input after the
/// id does not matter, since only the id value itself is decoded.
pub fn recover_id(raw: &str) -> Option<Value> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'"' => {
                let end = string_end(bytes, i)?;
                if depth == 1 && &raw[i..=end] == "\"id\"" {
                    let rest = raw[end + 1..].trim_start();
                    if let Some(after_colon) = rest.strip_prefix(':') {
                        return decode_scalar(after_colon);
                    }
                }
                i = end;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the closing quote for the string literal opening at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn decode_scalar(text: &str) -> Option<Value> {
    let mut stream = serde_json::Deserializer::from_str(text.trim_start()).into_iter::<Value>();
    match stream.next()? {
        Ok(value @ (Value::Number(_) | Value::String(_))) => Some(value),
        _ => None,
    }
}
