//! Line writer for the stdout side of the bridge.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Serialises whole-line writes from concurrent request tasks.
///
/// Each line is written together with its terminator under one lock and then
/// flushed, so concurrent responses never interleave and the client never
/// sees a partial line.
#[derive(Debug)]
pub struct OutputWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> OutputWriter<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Write `line` followed by `\n`. Empty lines are skipped.
    ///
    /// # Errors
    ///
    /// Propagates the underlying write error; a closed consumer shows up as
    /// [`std::io::ErrorKind::BrokenPipe`].
    pub async fn write_line(&self, line: &str) -> std::io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        let mut guard = self.inner.lock().await;
        guard.write_all(&data).await?;
        guard.flush().await
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}
