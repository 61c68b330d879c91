#![no_main]

//! Fuzz target for SSE reassembly.
//!
//! # Goal
//! Feed arbitrary bytes in arbitrary chunkings and verify that the
//! reassembler never panics, only emits frames whose data is valid JSON,
//! and produces the same frames regardless of chunk boundaries.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rpc_bridge::bridge::sse::{SseFrame, SseReassembler};

#[derive(Arbitrary, Debug)]
struct FuzzSseInput {
    body: Vec<u8>,
    /// Chunk lengths; the remainder is fed as one final chunk.
    cuts: Vec<u8>,
    /// Small limits exercise the overflow paths.
    max_frame_bytes: u16,
}

fn run(body: &[u8], cuts: &[u8], max: usize) -> Vec<SseFrame> {
    let mut reassembler = SseReassembler::new(max);
    let mut frames = Vec::new();
    let mut rest = body;
    for &cut in cuts {
        let n = usize::from(cut).min(rest.len());
        let (chunk, tail) = rest.split_at(n);
        frames.extend(reassembler.feed(chunk));
        rest = tail;
    }
    frames.extend(reassembler.feed(rest));
    frames.extend(reassembler.finish());
    frames
}

fuzz_target!(|input: FuzzSseInput| {
    let max = usize::from(input.max_frame_bytes).max(1);
    let chunked = run(&input.body, &input.cuts, max);

    for frame in &chunked {
        assert!(serde_json::from_str::<serde_json::Value>(&frame.data).is_ok());
        assert!(frame.data.len() <= max);
    }

    // Chunking only matters when no line overflows the limit.
    if input.body.len() <= max {
        assert_eq!(chunked, run(&input.body, &[], max));
    }
});
