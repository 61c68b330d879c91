//! Resolved, validated bridge configuration.
//!
//! Built once at startup from [`BridgeArgs`] and shared read-only by every
//! request task. A destination URL that does not parse, or is not `http` or
//! `https`, is a fatal startup error.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::cli::BridgeArgs;
use crate::error::ConfigError;

/// Upper bound for a stdin line, an SSE frame's data, or a direct JSON body.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Immutable settings for one bridge process.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Destination endpoint for every POST.
    pub url: Url,
    /// Bearer credential, sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
    /// Connect timeout (TCP + TLS handshake).
    pub connect_timeout: Duration,
    /// Whole-request timeout. `None` leaves hung upstreams pending.
    pub request_timeout: Option<Duration>,
    /// Concurrent request cap; 0 means unbounded.
    pub max_in_flight: usize,
    /// Grace period for in-flight requests after stdin EOF.
    pub drain_grace: Duration,
}

impl BridgeConfig {
    /// Config for `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `url` is not an absolute
    /// `http`/`https` URL.
    pub fn with_url(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_url(url)?,
            token: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
            max_in_flight: 0,
            drain_grace: Duration::from_secs(5),
        })
    }

    /// Validate parsed CLI/environment arguments.
    ///
    /// An empty token is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unusable URL or a zero request timeout.
    pub fn from_args(args: &BridgeArgs) -> Result<Self, ConfigError> {
        let request_timeout = match args.request_timeout_secs {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    name: "BRIDGE_REQUEST_TIMEOUT_SECS",
                    reason: "must be greater than zero (omit it to disable)".to_string(),
                });
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            url: parse_url(&args.url)?,
            token: args.token.clone().filter(|t| !t.trim().is_empty()),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            request_timeout,
            max_in_flight: args.max_in_flight,
            drain_grace: Duration::from_millis(args.drain_grace_ms),
        })
    }

    /// Build the shared HTTP client for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the TLS backend fails to
    /// initialise.
    pub fn build_client(&self) -> Result<Client, ConfigError> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(true);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(ConfigError::HttpClient)
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("url", &self.url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("drain_grace", &self.drain_grace)
            .finish()
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
