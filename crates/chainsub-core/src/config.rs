//! Listener configuration.
//!
//! # Example
//!
//! ```rust
//! use chainsub_core::config::{DecodeErrorPolicy, ListenerBuilder, StreamKind};
//!
//! let config = ListenerBuilder::new(StreamKind::Blocks)
//!     .server("10.0.0.5")
//!     .on_decode_error(DecodeErrorPolicy::Skip)
//!     .build_config();
//! assert_eq!(config.endpoint().to_string(), "tcp://10.0.0.5:5563");
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which published stream a listener follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Blocks,
    Transactions,
}

impl StreamKind {
    /// Port the publisher binds for this stream by default.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Blocks => 5563,
            Self::Transactions => 5564,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocks => write!(f, "blocks"),
            Self::Transactions => write!(f, "transactions"),
        }
    }
}

// ─── Endpoint ─────────────────────────────────────────────────────────────────

/// A publisher address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Renders as a transport URL, e.g. `tcp://localhost:5563`.
impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`, with or without a leading `tcp://`.
impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("tcp://").unwrap_or(s);
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{s}'"))?;
        if host.is_empty() {
            return Err(format!("missing host in '{s}'"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port '{port}': {e}"))?;
        Ok(Self::new(host, port))
    }
}

// ─── ListenerConfig ───────────────────────────────────────────────────────────

/// What the receive loop does with a frame that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Stop the loop; the listener ends in the crashed state.
    #[default]
    Terminate,
    /// Log, count, drop any partial block pair and keep receiving.
    Skip,
}

/// Configuration for a single listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub kind: StreamKind,
    /// Publisher host.
    #[serde(default = "default_server")]
    pub server: String,
    /// Publisher port. Defaults to the stream's well-known port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Longest single wait on the transport before the stop flag is checked.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub on_decode_error: DecodeErrorPolicy,
    /// Name of the receive thread; `chainsub-{kind}` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
}

fn default_server() -> String {
    "localhost".into()
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl ListenerConfig {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            server: default_server(),
            port: None,
            poll_interval_ms: default_poll_interval_ms(),
            on_decode_error: DecodeErrorPolicy::default(),
            thread_name: None,
        }
    }

    /// `localhost:5563`, terminate on decode errors.
    pub fn blocks() -> Self {
        Self::new(StreamKind::Blocks)
    }

    /// `localhost:5564`, terminate on decode errors.
    pub fn transactions() -> Self {
        Self::new(StreamKind::Transactions)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.server.clone(),
            self.port.unwrap_or_else(|| self.kind.default_port()),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn thread_name(&self) -> String {
        self.thread_name
            .clone()
            .unwrap_or_else(|| format!("chainsub-{}", self.kind))
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Fluent builder for `ListenerConfig`.
pub struct ListenerBuilder {
    config: ListenerConfig,
}

impl ListenerBuilder {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            config: ListenerConfig::new(kind),
        }
    }

    /// Set the publisher host.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Set the publisher port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Set host and port from an endpoint.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.server = endpoint.host;
        self.config.port = Some(endpoint.port);
        self
    }

    /// Set how often the receive loop checks for cancellation.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn on_decode_error(mut self, policy: DecodeErrorPolicy) -> Self {
        self.config.on_decode_error = policy;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = Some(name.into());
        self
    }

    pub fn build_config(self) -> ListenerConfig {
        self.config
    }
}
