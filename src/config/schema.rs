//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
///
/// Constructed once at startup (from file and/or CLI flags) and never
/// mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (port, connection limits, drain grace).
    pub listener: ListenerConfig,

    /// Coordination backend configuration.
    pub coordination: CoordinationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// TCP port to listen on (1-65535).
    pub listen_port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Grace period allowed for in-flight connections to drain on shutdown.
    pub drain_grace_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_port: 38080,
            max_connections: 10_000,
            drain_grace_ms: 5_000,
        }
    }
}

/// Coordination backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Backend connection string: "host:port[,host:port...]".
    pub endpoint: String,

    /// Timeout for a single connection attempt to one backend host.
    pub connect_timeout_ms: u64,

    /// Base delay for reconnect backoff.
    pub backoff_base_ms: u64,

    /// Cap for reconnect backoff.
    pub backoff_max_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout_ms: 4_000,
            backoff_base_ms: 250,
            backoff_max_ms: 8_000,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether to expose a Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
