//! Configuration loading from disk and the process environment.
//!
//! Precedence, lowest to highest: built-in defaults, optional TOML file,
//! environment variables.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_TCP_PORT: &str = "TCP_PORT";
pub const ENV_ENDPOINT: &str = "WEB_API_ENDPOINT";
pub const ENV_AUTH_TOKEN: &str = "WEB_API_AUTH_TOKEN";
pub const ENV_MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
pub const ENV_CONNECTION_TIMEOUT: &str = "CONNECTION_TIMEOUT";
pub const ENV_METRICS_PORT: &str = "METRICS_PORT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from an optional TOML file plus the process environment,
/// then validate it.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers can supply a fixed map.
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get(ENV_TCP_PORT) {
        let port: u16 = parse_env(ENV_TCP_PORT, &port)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(endpoint) = get(ENV_ENDPOINT) {
        config.upstream.endpoint = endpoint;
    }
    if let Some(token) = get(ENV_AUTH_TOKEN) {
        config.upstream.auth_token = Some(token);
    }
    if let Some(max) = get(ENV_MAX_CONNECTIONS) {
        config.listener.max_connections = parse_env(ENV_MAX_CONNECTIONS, &max)?;
    }
    if let Some(secs) = get(ENV_CONNECTION_TIMEOUT) {
        config.timeouts.connection_secs = parse_env(ENV_CONNECTION_TIMEOUT, &secs)?;
    }
    if let Some(port) = get(ENV_METRICS_PORT) {
        let port: u16 = parse_env(ENV_METRICS_PORT, &port)?;
        config.observability.metrics_address = format!("0.0.0.0:{}", port);
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
    if let Some(format) = get(ENV_LOG_FORMAT) {
        config.observability.log_format = format.parse().map_err(|reason| ConfigError::InvalidEnv {
            key: ENV_LOG_FORMAT,
            value: format.clone(),
            reason,
        })?;
    }

    // An empty token in the file means "no auth".
    if config.upstream.auth_token.as_deref().is_some_and(|t| t.is_empty()) {
        config.upstream.auth_token = None;
    }

    Ok(())
}

fn parse_env<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
