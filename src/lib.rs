//! Line-oriented stdio ⇄ HTTP/SSE bridge for JSON-RPC 2.0.
//!
//! Reads one JSON-RPC message per line on stdin, POSTs each to an HTTP
//! endpoint, and writes exactly one correlated response line per request to
//! stdout, whether the endpoint answers with a JSON body or an SSE stream.
//! Notifications never produce output.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod jsonrpc;
