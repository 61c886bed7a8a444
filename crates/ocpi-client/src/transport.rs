//! Transport capability: one HTTP exchange, no retry, no status interpretation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{OcpiError, OcpiResult};

/// A fully built request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Raw answer of the remote party.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Performs HTTP verbs against a remote party.
///
/// An `Err` means no HTTP status was received (connect failure, timeout,
/// reset); any received status, including 5xx, is an `Ok`.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: TransportRequest) -> OcpiResult<TransportResponse>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> OcpiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OcpiError::Precondition {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> OcpiResult<TransportResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| OcpiError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
