//! Error types for the stdio ⇄ HTTP bridge.
//!
//! `FramingError` covers per-line ingestion failures on stdin. `ForwardError`
//! covers per-request upstream failures and knows how to present itself as a
//! JSON-RPC error. `ConfigError` is the only fatal category: it is raised at
//! startup and ends the process with a non-zero exit code. `BridgeError` wraps
//! what can escape [`crate::bridge::run_bridge`].

use serde_json::Value;

use crate::jsonrpc::INTERNAL_ERROR;

/// Errors that can occur when decoding a single NDJSON line from stdin.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single line exceeds the maximum size.
    ///
    /// Checked before JSON decoding so oversized input is never buffered.
    #[error("Message exceeds maximum size of {max_bytes} bytes")]
    MessageTooLarge {
        /// The configured maximum message size in bytes.
        max_bytes: usize,
    },

    /// The line is not valid JSON.
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// Human-readable description of the parse failure.
        reason: String,
        /// Request id salvaged from the raw text, if any.
        recovered_id: Option<Value>,
    },

    /// Valid JSON, but not an object with a `jsonrpc` member.
    #[error("Missing required jsonrpc field")]
    MissingVersion,

    /// An underlying IO error occurred while reading stdin.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures while forwarding one message to the upstream server.
///
/// Every variant is recovered locally: the forwarder turns it into a JSON-RPC
/// error response (or silence for notifications), never into a crash.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Upstream answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: u16,
        /// Response body as received (lossy UTF-8).
        body: String,
    },

    /// Connection refused, reset, DNS failure, timeout before headers.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body failed mid-read.
    #[error("Stream error: {0}")]
    Stream(#[source] reqwest::Error),

    /// A direct JSON body exceeded the size limit.
    #[error("Upstream response too large: exceeds {max_bytes} byte limit")]
    BodyTooLarge {
        /// The configured limit in bytes.
        max_bytes: usize,
    },

    /// The exchange finished without any usable JSON-RPC payload.
    #[error("No valid JSON-RPC response received from server")]
    NoValidResponse,
}

impl ForwardError {
    /// JSON-RPC error code carried by the synthesized response.
    ///
    /// Upstream HTTP failures surface their status code verbatim; everything
    /// else is an internal error.
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            ForwardError::HttpStatus { status, .. } => i64::from(*status),
            ForwardError::Transport(_)
            | ForwardError::Stream(_)
            | ForwardError::BodyTooLarge { .. }
            | ForwardError::NoValidResponse => INTERNAL_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Invalid startup configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The destination URL does not parse or is not http(s).
    #[error("Invalid destination URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A setting is present but has an unusable value.
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Setting name (environment variable or flag).
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Errors that can end a bridge run.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Startup configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading stdin failed irrecoverably.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Config(_) => 2,
            BridgeError::Io(_) => 1,
        }
    }
}
