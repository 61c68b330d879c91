//! Shared integration test helpers.

#![allow(dead_code)]

pub mod mock_upstream;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rpc_bridge::bridge::lifecycle::ShutdownReason;
use rpc_bridge::bridge::run_bridge_with;
use rpc_bridge::config::BridgeConfig;
use rpc_bridge::error::BridgeError;

/// How long a test waits for a line before failing.
pub const LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// An in-process bridge wired to in-memory stdin/stdout pipes.
pub struct BridgeHarness {
    stdin: Option<DuplexStream>,
    stdout: BufReader<DuplexStream>,
    signal: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<ShutdownReason, BridgeError>>,
}

impl BridgeHarness {
    /// Start a bridge for `config`.
    pub fn start(config: BridgeConfig) -> Self {
        let (stdin_client, stdin_bridge) = tokio::io::duplex(1 << 16);
        let (stdout_bridge, stdout_client) = tokio::io::duplex(1 << 16);
        let (signal_tx, signal_rx) = oneshot::channel::<()>();

        let shutdown = async move {
            match signal_rx.await {
                Ok(()) => "SIGTERM",
                Err(_) => std::future::pending().await,
            }
        };

        let handle = tokio::spawn(run_bridge_with(
            config,
            stdin_bridge,
            stdout_bridge,
            shutdown,
        ));

        Self {
            stdin: Some(stdin_client),
            stdout: BufReader::new(stdout_client),
            signal: Some(signal_tx),
            handle,
        }
    }

    /// Start a bridge pointed at `url` with defaults.
    pub fn start_for(url: &str) -> Self {
        Self::start(BridgeConfig::with_url(url).unwrap())
    }

    /// Write one line (newline appended) to the bridge's stdin.
    pub async fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(line.as_bytes()).await.unwrap();
        stdin.write_all(b"\n").await.unwrap();
        stdin.flush().await.unwrap();
    }

    /// Write raw bytes to stdin without adding a newline.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(bytes).await.unwrap();
        stdin.flush().await.unwrap();
    }

    /// Read the next stdout line, without its newline.
    pub async fn next_line(&mut self) -> String {
        let mut line = String::new();
        let n = tokio::time::timeout(LINE_TIMEOUT, self.stdout.read_line(&mut line))
            .await
            .expect("timed out waiting for bridge output")
            .unwrap();
        assert!(n > 0, "bridge stdout closed unexpectedly");
        assert!(line.ends_with('\n'), "output line must be newline-terminated");
        line.pop();
        line
    }

    /// Close stdin, wait for the bridge to stop, and return the remaining
    /// output lines together with the shutdown reason.
    pub async fn finish(mut self) -> (Vec<String>, ShutdownReason) {
        self.stdin.take();
        let reason = tokio::time::timeout(LINE_TIMEOUT * 2, &mut self.handle)
            .await
            .expect("bridge did not stop after stdin EOF")
            .unwrap()
            .unwrap();
        let lines = self.read_to_end().await;
        (lines, reason)
    }

    /// Deliver a termination signal and wait for the bridge to stop.
    pub async fn signal(mut self) -> ShutdownReason {
        if let Some(tx) = self.signal.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(LINE_TIMEOUT, &mut self.handle)
            .await
            .expect("bridge did not stop after signal")
            .unwrap()
            .unwrap()
    }

    /// Drop the stdout reader, then wait for the bridge to notice.
    pub async fn close_stdout_and_wait(self, trigger: &str) -> ShutdownReason {
        let BridgeHarness {
            stdin,
            stdout,
            signal: _signal,
            handle,
        } = self;
        drop(stdout);
        let mut stdin = stdin.expect("stdin already closed");
        stdin.write_all(trigger.as_bytes()).await.unwrap();
        stdin.write_all(b"\n").await.unwrap();
        tokio::time::timeout(LINE_TIMEOUT, handle)
            .await
            .expect("bridge did not stop after stdout closed")
            .unwrap()
            .unwrap()
    }

    async fn read_to_end(&mut self) -> Vec<String> {
        let mut rest = String::new();
        tokio::time::timeout(LINE_TIMEOUT, self.stdout.read_to_string(&mut rest))
            .await
            .expect("bridge stdout was not closed")
            .unwrap();
        rest.lines().map(str::to_string).collect()
    }
}
