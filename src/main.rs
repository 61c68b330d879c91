//! `rpc-bridge` entry point.
//!
//! Exit codes: `0` on EOF, termination signal, or closed stdout; `2` on
//! invalid configuration; `1` if stdin fails with an I/O error.

use clap::Parser;

use rpc_bridge::bridge::run_bridge;
use rpc_bridge::cli::BridgeArgs;
use rpc_bridge::config::BridgeConfig;
use rpc_bridge::error::BridgeError;

/// Bridge a line-oriented JSON-RPC 2.0 client on stdio to an HTTP endpoint.
#[derive(Parser)]
#[command(name = "rpc-bridge", version)]
struct Cli {
    #[command(flatten)]
    args: BridgeArgs,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.args.verbose);

    let code = match run(cli.args).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "bridge failed");
            eprintln!("rpc-bridge: {e}");
            e.exit_code()
        }
    };

    // stdin is read on a blocking thread that cannot be cancelled, so leave
    // without waiting for runtime shutdown.
    std::process::exit(code);
}

async fn run(args: BridgeArgs) -> Result<(), BridgeError> {
    let config = BridgeConfig::from_args(&args)?;
    tracing::debug!(?config, "configuration resolved");
    let reason = run_bridge(config).await?;
    tracing::debug!(%reason, "clean shutdown");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing Init
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber on stderr; stdout carries protocol only.
///
/// `verbose` forces `debug`. Otherwise `RUST_LOG` is respected, defaulting to
/// `warn`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
