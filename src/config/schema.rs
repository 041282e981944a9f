//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the TCP proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// TCP listener configuration (bind address, admission ceiling).
    pub listener: ListenerConfig,

    /// Upstream HTTPS endpoint settings.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections. New connections beyond this are closed.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 1000,
        }
    }
}

/// Upstream endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Full URL every payload is POSTed to. Required.
    pub endpoint: String,

    /// Bearer token sent in the `Authorization` header, if any.
    pub auth_token: Option<String>,

    /// Value of the `User-Agent` header.
    pub user_agent: String,

    /// Idle pooled connections kept per upstream host.
    pub pool_max_idle_per_host: usize,

    /// Seconds an idle pooled connection is kept open.
    pub pool_idle_timeout_secs: u64,

    /// Honour `HTTPS_PROXY` / `HTTP_PROXY` from the environment.
    pub system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            user_agent: "TCP-Proxy/1.0".to_string(),
            pool_max_idle_per_host: 10,
            pool_idle_timeout_secs: 90,
            system_proxy: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-connection deadline in seconds. Also the upstream request timeout.
    pub connection_secs: u64,
}

impl TimeoutConfig {
    pub fn connection(&self) -> Duration {
        Duration::from_secs(self.connection_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connection_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Metrics / health endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
