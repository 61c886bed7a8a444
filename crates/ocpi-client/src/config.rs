//! Client configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{OcpiError, OcpiResult};
use crate::types::CredentialsRole;

pub const CLIENT_USER_AGENT: &str = concat!("ocpi-client/", env!("CARGO_PKG_VERSION"));

/// Configuration of one client instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Our own versions (discovery) URL, sent in credentials documents.
    #[serde(default)]
    pub versions_url: Option<String>,

    /// Business roles this party declares.
    #[serde(default)]
    pub roles: Vec<CredentialsRole>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retransmit when an attempt failed without an HTTP status.
    #[serde(default = "default_true")]
    pub retry_on_transport_error: bool,

    /// Skip TLS certificate validation (test setups only).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Idle connections kept per host.
    #[serde(default = "default_pool_idle")]
    pub pool_idle_per_host: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_pool_idle() -> usize {
    8
}

fn default_user_agent() -> String {
    CLIENT_USER_AGENT.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            versions_url: None,
            roles: Vec::new(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_on_transport_error: true,
            accept_invalid_certs: false,
            pool_idle_per_host: default_pool_idle(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `OCPI_VERSIONS_URL` | Own versions URL |
    /// | `OCPI_TIMEOUT` | Request timeout in seconds |
    /// | `OCPI_CONNECT_TIMEOUT` | Connect timeout in seconds |
    /// | `OCPI_MAX_RETRIES` | Retries for transient failures |
    /// | `OCPI_ACCEPT_INVALID_CERTS` | Disable TLS validation (dev only) |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            versions_url: std::env::var("OCPI_VERSIONS_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            timeout_secs: env_parse("OCPI_TIMEOUT").unwrap_or(defaults.timeout_secs),
            connect_timeout_secs: env_parse("OCPI_CONNECT_TIMEOUT")
                .unwrap_or(defaults.connect_timeout_secs),
            max_retries: env_parse("OCPI_MAX_RETRIES").unwrap_or(defaults.max_retries),
            accept_invalid_certs: std::env::var("OCPI_ACCEPT_INVALID_CERTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ..defaults
        }
    }

    /// Parse a YAML document into a config.
    pub fn from_yaml_str(yaml: &str) -> OcpiResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| OcpiError::Precondition {
            message: format!("invalid client configuration: {}", e),
        })
    }

    pub fn with_versions_url(mut self, url: impl Into<String>) -> Self {
        self.versions_url = Some(url.into());
        self
    }

    pub fn with_role(mut self, role: CredentialsRole) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry_on_transport_error(mut self, retry: bool) -> Self {
        self.retry_on_transport_error = retry;
        self
    }

    /// Accept invalid TLS certificates.
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Parse an environment variable; a malformed value is logged and ignored.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = key, value = %raw, "ignoring malformed environment variable");
            None
        }
    }
}
