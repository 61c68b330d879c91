//! The stdio ⇄ HTTP bridge.
//!
//! [`run_bridge`] reads NDJSON lines from stdin and hands each decoded
//! message to its own task, which forwards it upstream and writes the
//! resulting line (if any) to stdout. Lines are not serialised: a slow
//! request does not hold back the ones behind it, and responses appear in
//! completion order. JSON-RPC ids carry the correlation.
//!
//! In-flight requests are unbounded unless `max_in_flight` is set, in which
//! case reading stdin pauses while the limit is reached. There is no
//! per-request deadline unless `request_timeout` is configured, so a hung
//! upstream keeps its request pending until shutdown.

pub mod forwarder;
pub mod lifecycle;
pub mod ndjson;
pub mod output;
pub mod sse;

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};

use crate::config::{BridgeConfig, MAX_MESSAGE_BYTES};
use crate::error::{BridgeError, FramingError};
use crate::jsonrpc::{PARSE_ERROR, error_response};

use forwarder::Forwarder;
use lifecycle::{ShutdownReason, is_broken_pipe, termination_signal};
use ndjson::{bounded_read_line, parse_line_bytes};
use output::OutputWriter;

// ─────────────────────────────────────────────────────────────────────────────
// Entry Points
// ─────────────────────────────────────────────────────────────────────────────

/// Bridge the process's stdin/stdout to the configured endpoint until EOF,
/// a termination signal, or a closed stdout.
///
/// # Errors
///
/// Returns [`BridgeError`] if the HTTP client cannot be built or stdin fails
/// with an I/O error.
pub async fn run_bridge(config: BridgeConfig) -> Result<ShutdownReason, BridgeError> {
    run_bridge_with(
        config,
        tokio::io::stdin(),
        tokio::io::stdout(),
        termination_signal(),
    )
    .await
}

/// [`run_bridge`] over arbitrary streams, stopping when `shutdown` resolves.
///
/// # Errors
///
/// See [`run_bridge`].
pub async fn run_bridge_with<R, W, S>(
    config: BridgeConfig,
    input: R,
    output: W,
    shutdown: S,
) -> Result<ShutdownReason, BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = &'static str>,
{
    let config = Arc::new(config);
    let forwarder = Forwarder::new(config.clone())?;
    let output = Arc::new(OutputWriter::new(output));
    let limiter =
        (config.max_in_flight > 0).then(|| Arc::new(Semaphore::new(config.max_in_flight)));

    tracing::info!(url = %config.url, max_in_flight = config.max_in_flight, "bridge started");

    // Flipped by any task whose write finds stdout gone.
    let (closed_tx, mut closed_rx) = watch::channel(false);
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    tokio::pin!(shutdown);

    let reason = loop {
        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }

        buf.clear();
        let read = tokio::select! {
            biased;
            name = &mut shutdown => break ShutdownReason::Signal(name),
            _ = closed_rx.changed() => break ShutdownReason::OutputClosed,
            read = bounded_read_line(&mut reader, &mut buf, MAX_MESSAGE_BYTES) => read,
        };

        match read {
            Ok(0) => break ShutdownReason::InputClosed,
            Ok(_) => {}
            Err(FramingError::Io(e)) => {
                tracing::error!(error = %e, "failed to read stdin");
                in_flight.abort_all();
                return Err(BridgeError::Io(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping input line");
                continue;
            }
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let msg = match parse_line_bytes(&buf) {
            Ok(msg) => msg,
            Err(FramingError::MalformedJson {
                reason,
                recovered_id,
            }) => {
                tracing::warn!(reason = %reason, ?recovered_id, "dropping malformed input line");
                let response = error_response(recovered_id.as_ref(), PARSE_ERROR, "Parse error");
                if let Some(response) = response {
                    if let Err(e) = output.write_line(&response).await {
                        report_write_error(&e);
                        break ShutdownReason::OutputClosed;
                    }
                }
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping input line");
                continue;
            }
        };

        let permit = match &limiter {
            None => None,
            Some(sem) => tokio::select! {
                biased;
                name = &mut shutdown => break ShutdownReason::Signal(name),
                permit = sem.clone().acquire_owned() => permit.ok(),
            },
        };

        tracing::debug!(id = ?msg.id, in_flight = in_flight.len(), "dispatching message");
        let forwarder = forwarder.clone();
        let output = output.clone();
        let closed_tx = closed_tx.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            let Some(response) = forwarder.forward(&msg).await else {
                return;
            };
            if let Err(e) = output.write_line(&response).await {
                report_write_error(&e);
                let _ = closed_tx.send(true);
            }
        });
    };

    if reason == ShutdownReason::InputClosed && !in_flight.is_empty() {
        drain(&mut in_flight, &config, shutdown, &mut closed_rx).await;
    }
    in_flight.abort_all();

    tracing::info!(%reason, "bridge stopped");
    Ok(reason)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Give in-flight requests up to the drain grace to finish after EOF.
async fn drain<S>(
    in_flight: &mut JoinSet<()>,
    config: &BridgeConfig,
    shutdown: std::pin::Pin<&mut S>,
    closed_rx: &mut watch::Receiver<bool>,
) where
    S: Future<Output = &'static str>,
{
    tracing::debug!(pending = in_flight.len(), "input closed, draining in-flight requests");

    let wait_all = async {
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
    };

    tokio::select! {
        _ = wait_all => {}
        _ = tokio::time::sleep(config.drain_grace) => {
            tracing::warn!("drain grace elapsed, abandoning in-flight requests");
        }
        name = shutdown => tracing::info!(signal = name, "signal received while draining"),
        _ = closed_rx.changed() => tracing::debug!("output closed while draining"),
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "request task panicked");
        }
    }
}

fn report_write_error(e: &std::io::Error) {
    if is_broken_pipe(e) {
        tracing::debug!("stdout closed by consumer");
    } else {
        tracing::error!(error = %e, "failed to write to stdout");
    }
}
