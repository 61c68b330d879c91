#![no_main]

//! Fuzz target for inbound line handling.
//!
//! # Goal
//! Verify that parsing a stdin line and synthesizing its error response
//! never panics, and that any response produced is a single JSON line whose
//! `id` equals the one the message (or its id recovery) carried.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use rpc_bridge::bridge::ndjson::parse_line;
use rpc_bridge::error::FramingError;
use rpc_bridge::jsonrpc::{INTERNAL_ERROR, PARSE_ERROR, error_response, recover_id};

#[derive(Arbitrary, Debug)]
struct FuzzLineInput {
    /// Raw line bytes.
    raw_bytes: Vec<u8>,
    /// Error message to echo in the synthesized response.
    message: String,
}

fuzz_target!(|input: FuzzLineInput| {
    let line = String::from_utf8_lossy(&input.raw_bytes);

    let (id, code) = match parse_line(&line) {
        Ok(msg) => {
            assert_eq!(msg.raw, line.trim());
            (msg.id, INTERNAL_ERROR)
        }
        Err(FramingError::MalformedJson { recovered_id, .. }) => (recovered_id, PARSE_ERROR),
        Err(_) => (None, INTERNAL_ERROR),
    };

    // Recovery on arbitrary text must not panic either.
    let _ = recover_id(&line);

    if let Some(response) = error_response(id.as_ref(), code, &input.message) {
        assert!(!response.contains('\n'));
        let parsed: Value = serde_json::from_str(&response).expect("response must be JSON");
        assert_eq!(Some(&parsed["id"]), id.as_ref());
    }
});
