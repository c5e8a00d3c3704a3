//! Relay transport
//!
//! Posts message and heartbeat records to the relay endpoint. Any HTTP
//! response, 4xx and 5xx included, is a completed attempt and is returned as
//! its status code; only connection-level faults and timeouts are errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use smsrelay_core::{RelayError, RelayRequest, RelayResult, RelaySettings};
use tracing::debug;
use url::Url;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Delivers relay requests to the backend
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Post `request`, authenticating with `credential` when one is given
    ///
    /// Returns the HTTP status code of the response.
    async fn send(&self, request: &RelayRequest, credential: Option<&str>) -> RelayResult<u16>;
}

// ----------------------------------------------------------------------------
// HTTP Transport
// ----------------------------------------------------------------------------

/// HTTPS transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpRelayTransport {
    pub fn new(settings: &RelaySettings) -> RelayResult<Self> {
        let endpoint = settings.endpoint_url()?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| {
                RelayError::invalid_configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout: settings.request_timeout,
        })
    }

    /// Absolute URL of a relay route
    pub fn route_url(&self, path: &str) -> RelayResult<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).map_err(|e| {
            RelayError::invalid_configuration(format!("Invalid route {}: {}", path, e))
        })
    }

    fn map_error(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RelayError::transport_error(err.to_string())
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, request: &RelayRequest, credential: Option<&str>) -> RelayResult<u16> {
        let url = self.route_url(request.path())?;
        let body = request.to_json()?;

        let mut builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(token) = credential.filter(|c| !c.is_empty()) {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        debug!(url = %url, status, "Relay request completed");
        Ok(status)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
