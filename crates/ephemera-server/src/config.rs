//! Server configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (`EPHEMERA_CONFIG` or the default search paths)
//! - Environment variables (`EPHEMERA_HOST`, `EPHEMERA_PORT`)

use anyhow::{Context, Result};
use ephemera_core::{RelayConfig, DEFAULT_ROOM};
use ephemera_protocol::render::DEFAULT_STREAM_TARGET;
use ephemera_transport::{DriverConfig, OutboundFormat, DEFAULT_MAX_MESSAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tracing::{debug, warn};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Room configuration.
    #[serde(default)]
    pub rooms: RoomsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// What subscribers receive: `json` or `html`.
    #[serde(default)]
    pub outbound_format: OutboundFormat,

    /// DOM id rendered fragments are appended to.
    #[serde(default = "default_stream_target")]
    pub stream_target: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per-connection outbound queue capacity.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Room configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Room for connections that name none.
    #[serde(default = "default_room")]
    pub default_room: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_stream_target() -> String {
    DEFAULT_STREAM_TARGET.to_string()
}

fn default_outbound_queue_capacity() -> usize {
    ephemera_core::relay::DEFAULT_OUTBOUND_QUEUE_CAPACITY
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            outbound_format: OutboundFormat::default(),
            stream_target: default_stream_target(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// override is not valid.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn find_file() -> Option<String> {
        if let Ok(path) = std::env::var("EPHEMERA_CONFIG") {
            return Some(shellexpand::tilde(&path).into_owned());
        }

        let config_paths = [
            "ephemera.toml",
            "/etc/ephemera/ephemera.toml",
            "~/.config/ephemera/ephemera.toml",
        ];

        config_paths
            .iter()
            .map(|path| shellexpand::tilde(path).into_owned())
            .find(|path| Path::new(path).exists())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `EPHEMERA_HOST` and `EPHEMERA_PORT` from `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("EPHEMERA_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("EPHEMERA_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid EPHEMERA_PORT: {port}"))?;
        }
        if self.limits.outbound_queue_capacity == 0 {
            warn!("outbound_queue_capacity of 0 raised to 1");
            self.limits.outbound_queue_capacity = 1;
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Relay settings derived from this configuration.
    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            default_room: self.rooms.default_room.clone(),
            outbound_queue_capacity: self.limits.outbound_queue_capacity,
        }
    }

    /// Driver settings derived from this configuration.
    #[must_use]
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            format: self.transport.outbound_format,
            stream_target: self.transport.stream_target.clone(),
        }
    }
}
