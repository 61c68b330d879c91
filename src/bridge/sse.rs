//! Server-Sent Events frame reassembly.
//!
//! The upstream body arrives in arbitrary network chunks; a `data:` line can
//! be split anywhere, including inside a multi-byte UTF-8 sequence. Bytes
//! after the last line terminator of a chunk are carried over and prefixed
//! onto the next one. `\n`, `\r\n` and a bare `\r` all end a line, and a
//! `\r\n` split across two chunks still counts once. Complete lines drive a
//! two-state machine:
//!
//! ```text
//!   Idle ──event:/data:──▶ Accumulating ──blank line──▶ Idle (+ frame)
//!    ▲  ╰─ ":" comment, blank ─╯   │  ╰─ event:/data:/":" ─╯
//!    ╰─────────────────────────────╯
//! ```
//!
//! A frame is only ever produced at a blank-line terminator (or at end of
//! stream), never while its data may still be streaming. Frames whose data is
//! not valid JSON are logged and discarded; the stream keeps going. This is
//! best-effort recovery: a payload split across frames by a misbehaving
//! server is not stitched back together.

use serde_json::Value;

/// A completed frame whose data decoded as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// The `event:` name, if one was given.
    pub event: Option<String>,
    /// The reassembled data exactly as received.
    pub data: String,
    /// `data` decoded, used for id matching.
    pub payload: Value,
}

#[derive(Debug, Default, PartialEq)]
enum FrameState {
    #[default]
    Idle,
    Accumulating {
        event: Option<String>,
        data: String,
        /// Data exceeded the frame limit; the frame will be dropped.
        overflowed: bool,
    },
}

/// Incremental SSE parser producing JSON-bearing frames.
#[derive(Debug)]
pub struct SseReassembler {
    state: FrameState,
    /// Bytes of the current, not yet terminated line.
    partial: Vec<u8>,
    /// Discarding an over-long line until its terminator shows up.
    skipping_line: bool,
    /// The last chunk ended in `\r`; a leading `\n` on the next one belongs to it.
    after_cr: bool,
    max_frame_bytes: usize,
}

impl SseReassembler {
    /// New reassembler that drops frames whose data exceeds `max_frame_bytes`.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            state: FrameState::Idle,
            partial: Vec::new(),
            skipping_line: false,
            after_cr: false,
            max_frame_bytes,
        }
    }

    /// Whether a frame has been started but not yet terminated.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, FrameState::Accumulating { .. })
    }

    /// Feed one network chunk, returning frames completed by it, in order.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        if self.after_cr && !chunk.is_empty() {
            self.after_cr = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }

        if self.skipping_line {
            match chunk.iter().position(|&b| is_line_end(b)) {
                Some(end) => {
                    self.skipping_line = false;
                    chunk = &chunk[self.line_end_len(chunk, end)..];
                }
                None => return frames,
            }
        }

        let mut buf = std::mem::take(&mut self.partial);
        let mut search_from = buf.len();
        buf.extend_from_slice(chunk);

        let mut line_start = 0;
        while let Some(pos) = buf[search_from..].iter().position(|&b| is_line_end(b)) {
            let end = search_from + pos;
            let line = String::from_utf8_lossy(&buf[line_start..end]);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            line_start = self.line_end_len(&buf, end);
            search_from = line_start;
        }
        buf.drain(..line_start);

        if buf.len() > self.max_frame_bytes {
            tracing::warn!(
                buffered = buf.len(),
                max_frame_bytes = self.max_frame_bytes,
                "SSE line exceeds frame limit, skipping"
            );
            buf.clear();
            self.skipping_line = true;
            self.mark_overflowed();
        }
        self.partial = buf;
        frames
    }

    /// Flush at end of stream: the leftover line, then the open frame.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let leftover = std::mem::take(&mut self.partial);
        self.after_cr = false;
        if !self.skipping_line && !leftover.is_empty() {
            let line = String::from_utf8_lossy(&leftover);
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.skipping_line = false;
        self.process_line("")
    }

    /// Index just past the terminator at `buf[end]`. `\r\n` counts as one
    /// terminator, even when the `\n` arrives in the next chunk.
    fn line_end_len(&mut self, buf: &[u8], end: usize) -> usize {
        if buf[end] != b'\r' {
            return end + 1;
        }
        match buf.get(end + 1) {
            Some(b'\n') => end + 2,
            Some(_) => end + 1,
            None => {
                self.after_cr = true;
                end + 1
            }
        }
    }

    /// Apply one complete line (without its terminator) to the state machine.
    pub fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.complete_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        if let Some(rest) = line.strip_prefix("event:") {
            self.start_frame();
            if let FrameState::Accumulating { event, .. } = &mut self.state {
                *event = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.start_frame();
            let max = self.max_frame_bytes;
            if let FrameState::Accumulating {
                data, overflowed, ..
            } = &mut self.state
            {
                if *overflowed || data.len() + rest.len() > max {
                    *overflowed = true;
                    data.clear();
                } else {
                    data.push_str(rest);
                }
            }
        }
        // `id:`, `retry:` and unknown fields carry nothing the bridge needs.
        None
    }

    fn start_frame(&mut self) {
        if self.state == FrameState::Idle {
            self.state = FrameState::Accumulating {
                event: None,
                data: String::new(),
                overflowed: false,
            };
        }
    }

    fn mark_overflowed(&mut self) {
        self.start_frame();
        if let FrameState::Accumulating {
            data, overflowed, ..
        } = &mut self.state
        {
            *overflowed = true;
            data.clear();
        }
    }

    fn complete_frame(&mut self) -> Option<SseFrame> {
        let FrameState::Accumulating {
            event,
            data,
            overflowed,
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };

        if overflowed {
            tracing::warn!(?event, "discarding oversized SSE frame");
            return None;
        }
        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(&data) {
            Ok(payload) => Some(SseFrame {
                event,
                data,
                payload,
            }),
            Err(e) => {
                tracing::warn!(
                    ?event,
                    len = data.len(),
                    error = %e,
                    "discarding SSE frame with invalid JSON data"
                );
                None
            }
        }
    }
}

fn is_line_end(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}
