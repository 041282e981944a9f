//! HTTPS forwarder with pooled connections.
//!
//! # Responsibilities
//! - Build one shared `reqwest::Client` (pool, idle timeout, TLS verification)
//! - POST opaque payloads to the configured endpoint
//! - Turn HTTP status >= 400 into an error carrying status and body
//!
//! # Design Decisions
//! - No retries; the caller decides what a failure means
//! - Request timeout equals the per-connection timeout

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Errors that can occur while forwarding a payload.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid upstream endpoint '{0}'")]
    Endpoint(String),

    #[error("HTTPS request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTPS request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
}

/// Something that can carry a payload upstream and bring back the reply.
pub trait Forward: Send + Sync + 'static {
    fn forward(&self, payload: Vec<u8>) -> impl Future<Output = Result<Vec<u8>, ForwardError>> + Send;
}

/// Forwarder backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpsForwarder {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpsForwarder {
    /// Build the forwarder and its client.
    pub fn new(config: &UpstreamConfig, timeout: Duration) -> Result<Self, ForwardError> {
        let endpoint = Url::parse(config.endpoint.trim())
            .map_err(|_| ForwardError::Endpoint(config.endpoint.clone()))?;

        let mut builder = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .user_agent(config.user_agent.clone());
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(ForwardError::Client)?;

        tracing::info!(
            endpoint = %endpoint,
            auth = config.auth_token.is_some(),
            timeout_secs = timeout.as_secs(),
            "Upstream client initialized"
        );

        Ok(Self {
            client,
            endpoint,
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> ForwardError {
        if err.is_timeout() {
            ForwardError::Timeout(self.timeout)
        } else {
            ForwardError::Request(err)
        }
    }

    async fn send(&self, payload: Vec<u8>) -> Result<Vec<u8>, ForwardError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(payload);

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout(self.timeout)
            } else {
                ForwardError::Body(e)
            }
        })?;

        if status.as_u16() >= StatusCode::BAD_REQUEST.as_u16() {
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}

impl Forward for HttpsForwarder {
    async fn forward(&self, payload: Vec<u8>) -> Result<Vec<u8>, ForwardError> {
        self.send(payload).await
    }
}
