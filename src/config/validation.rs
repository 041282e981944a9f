//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection ceiling > 0)
//! - Check addresses and the upstream URL parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream endpoint is required (set WEB_API_ENDPOINT)")]
    MissingEndpoint,

    #[error("upstream endpoint '{endpoint}' is invalid: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("connection timeout must be greater than zero")]
    ZeroTimeout,

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a fully loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let endpoint = config.upstream.endpoint.trim();
    if endpoint.is_empty() {
        errors.push(ValidationError::MissingEndpoint);
    } else {
        match Url::parse(endpoint) {
            Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {}
            Ok(url) => errors.push(ValidationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.timeouts.connection_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(
        &mut errors,
        "observability.metrics_address",
        &config.observability.metrics_address,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
