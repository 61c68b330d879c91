//! NDJSON line decoding for the stdin side of the bridge.
//!
//! Pure decoding ([`parse_line`], [`parse_line_bytes`]) is kept apart from
//! the bounded async line reader ([`bounded_read_line`]) so each can be
//! tested without the other.

use serde_json::Value;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

use crate::config::MAX_MESSAGE_BYTES;
use crate::error::FramingError;
use crate::jsonrpc::{is_forwardable, message_id, recover_id};

/// A decoded stdin line that passed the envelope check.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The line without surrounding whitespace, sent upstream unchanged.
    pub raw: String,
    /// The `id` member exactly as sent; `None` for notifications.
    pub id: Option<Value>,
}

impl InboundMessage {
    /// Notifications carry no `id` member at all (`"id": null` is not one).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Decode one NDJSON line.
///
/// # Errors
///
/// - [`FramingError::MessageTooLarge`] before any decoding is attempted
/// - [`FramingError::MalformedJson`] for blank or undecodable text, carrying
///   whatever id could be salvaged from the raw line
/// - [`FramingError::MissingVersion`] for JSON that is not an object with a
///   `jsonrpc` member
pub fn parse_line(line: &str) -> Result<InboundMessage, FramingError> {
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(FramingError::MessageTooLarge {
            max_bytes: MAX_MESSAGE_BYTES,
        });
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FramingError::MalformedJson {
            reason: "empty message".to_string(),
            recovered_id: None,
        });
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| FramingError::MalformedJson {
        reason: e.to_string(),
        recovered_id: recover_id(trimmed),
    })?;

    if !is_forwardable(&value) {
        return Err(FramingError::MissingVersion);
    }

    Ok(InboundMessage {
        id: message_id(&value),
        raw: trimmed.to_string(),
    })
}

/// Decode one raw stdin line.
///
/// Bytes that are not UTF-8 are rejected as malformed rather than repaired,
/// so whatever is sent upstream is exactly what was read.
///
/// # Errors
///
/// As [`parse_line`], plus [`FramingError::MalformedJson`] for invalid UTF-8.
pub fn parse_line_bytes(line: &[u8]) -> Result<InboundMessage, FramingError> {
    match std::str::from_utf8(line) {
        Ok(text) => parse_line(text),
        Err(e) => Err(FramingError::MalformedJson {
            reason: format!("invalid UTF-8: {e}"),
            recovered_id: recover_id(&String::from_utf8_lossy(line)),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Line Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read one line into `buf`, refusing to buffer more than `max_bytes`.
///
/// The line is appended as raw bytes, terminator included; decoding waits
/// until it is complete. An over-long line is still consumed up to its
/// newline so the next call starts on a fresh line, but nothing past the
/// limit is kept.
///
/// # Returns
///
/// - `Ok(n)` with `n > 0`: a line (possibly without trailing newline at EOF)
/// - `Ok(0)`: EOF
/// - `Err(FramingError::MessageTooLarge)`: the line was skipped
/// - `Err(FramingError::Io)`: the reader failed
pub async fn bounded_read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let start = buf.len();
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }

        let (take, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if !oversized && buf.len() - start + take > max_bytes {
            oversized = true;
            buf.truncate(start);
        }
        if !oversized {
            buf.extend_from_slice(&available[..take]);
        }
        reader.consume(take);

        if complete {
            break;
        }
    }

    if oversized {
        return Err(FramingError::MessageTooLarge { max_bytes });
    }
    Ok(buf.len() - start)
}
