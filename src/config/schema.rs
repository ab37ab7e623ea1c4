//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::{PortRange, HOT_RELOAD_PATH};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, port, connection cap).
    pub listener: ListenerConfig,

    /// Upstream base URLs.
    pub upstream: UpstreamConfig,

    /// Rule table parameters.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 10_000,
        }
    }
}

/// Where traffic is forwarded.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Agent orchestration server (required).
    pub agent_server_url: Option<String>,

    /// Development tooling server, required while dev-tools routes are on.
    pub dev_server_url: Option<String>,

    /// Application server that receives passthrough traffic.
    pub app_server_url: Option<String>,
}

/// Rule table parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Lowest port a dynamic-port path may name.
    pub port_min: u16,

    /// Highest port a dynamic-port path may name.
    pub port_max: u16,

    /// Dynamic-port paths longer than this are rejected unparsed.
    pub max_dynamic_path_len: usize,

    /// Port used by a bare `/ws` upgrade.
    pub default_websocket_port: u16,

    /// Enable the `/ws/{port}` upgrade rule.
    pub websocket_proxy: bool,

    /// Enable the `/api/dev/` rules.
    pub dev_tools: bool,

    /// Upgrade paths always handed to the application server.
    pub reserved_upgrade_paths: Vec<String>,
}

impl RoutingConfig {
    pub fn port_range(&self) -> PortRange {
        PortRange::new(self.port_min, self.port_max)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            port_min: PortRange::WORKERS.min(),
            port_max: PortRange::WORKERS.max(),
            max_dynamic_path_len: 50,
            default_websocket_port: 8765,
            websocket_proxy: true,
            dev_tools: true,
            reserved_upgrade_paths: vec![HOT_RELOAD_PATH.to_string()],
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for an upstream to produce response headers, in seconds.
    pub request_secs: u64,

    /// Grace period for open connections after a shutdown signal, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
