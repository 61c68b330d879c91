//! Process lifecycle: termination signals and shutdown reasons.

use std::fmt;

/// Why the bridge stopped. Every reason is a clean shutdown (exit code 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// stdin reached end of stream.
    InputClosed,
    /// `SIGINT` or `SIGTERM` was received.
    Signal(&'static str),
    /// The stdout consumer went away.
    OutputClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::InputClosed => f.write_str("input closed"),
            ShutdownReason::Signal(name) => write!(f, "received {name}"),
            ShutdownReason::OutputClosed => f.write_str("output closed"),
        }
    }
}

/// Whether a stdout write failure means the consumer has gone away.
pub fn is_broken_pipe(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
    )
}

/// Resolve with the signal name on `SIGINT` or `SIGTERM`.
///
/// If a handler cannot be installed the failure is logged and that signal
/// is simply never reported.
pub async fn termination_signal() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGINT");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
