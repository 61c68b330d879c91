//! CLI argument types for `rpc-bridge`.
//!
//! Every setting can also be supplied through the environment; flags win over
//! environment variables, which win over the defaults. These types live
//! outside `main.rs` so integration tests can parse them directly.

use clap::Args;

/// Destination used when neither `--url` nor `BRIDGE_URL` is given.
pub const DEFAULT_URL: &str = "http://localhost:3000/mcp";

/// Arguments for the bridge.
#[derive(Args, Debug, Clone)]
pub struct BridgeArgs {
    /// JSON-RPC endpoint that receives one POST per inbound message.
    #[arg(long, env = "BRIDGE_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Bearer credential forwarded in the Authorization header.
    #[arg(long, env = "BRIDGE_AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// TCP/TLS connect timeout in milliseconds.
    #[arg(long, env = "BRIDGE_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in seconds. Unset means requests may wait forever.
    #[arg(long, env = "BRIDGE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Maximum concurrently forwarded requests (0 = unbounded).
    #[arg(long, env = "BRIDGE_MAX_IN_FLIGHT", default_value_t = 0)]
    pub max_in_flight: usize,

    /// How long to wait for in-flight responses after stdin closes.
    #[arg(long, env = "BRIDGE_DRAIN_GRACE_MS", default_value_t = 5000)]
    pub drain_grace_ms: u64,

    /// Enable debug logging on stderr.
    #[arg(long)]
    pub verbose: bool,
}
