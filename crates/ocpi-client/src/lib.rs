//! Client-side OCPI engine.
//!
//! This crate implements the client side of the OCPI credentials module and
//! its prerequisites, providing:
//!
//! - Version listing and version detail discovery with an in-memory cache
//! - Lazy endpoint resolution (listing and detail fetch on first use)
//! - A shared retry policy with injectable delay and cooperative cancellation
//! - Credentials fetch, create, update and delete
//! - The token A/B/C registration handshake with role validation
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ocpi_client::{
//!     AccessToken, BusinessDetails, ClientConfig, CredentialsRole, InMemoryPartyRegistry,
//!     OcpiClient, PartyStatus, RemoteAccessInfo, RemoteParty, Role,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env()
//!     .with_versions_url("https://emsp.example.com/ocpi/versions")
//!     .with_role(CredentialsRole::new(
//!         "DE",
//!         "EXA",
//!         Role::Emsp,
//!         BusinessDetails::named("Example Mobility"),
//!     ));
//!
//! let remote = RemoteParty {
//!     id: "NL-ABC".to_string(),
//!     roles: vec![CredentialsRole::new(
//!         "NL",
//!         "ABC",
//!         Role::Cpo,
//!         BusinessDetails::named("ABC Charging"),
//!     )],
//!     access_infos: vec![RemoteAccessInfo::new(
//!         "https://cpo.example.com/ocpi/versions".parse()?,
//!         AccessToken::new("token-a"),
//!     )],
//!     local_access_token: None,
//!     status: PartyStatus::Enabled,
//! };
//!
//! let client = OcpiClient::new(config, remote, Arc::new(InMemoryPartyRegistry::new()))?;
//! let response = client.register(None, None).await;
//! if response.is_success() {
//!     println!("registered, version {:?}", client.selected_version().await);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Protocol operations return a [`ResponseEnvelope`] and never fail with
//! `Err`; the envelope's `error` field says why a call produced no usable
//! data. Only client construction returns [`OcpiError::Precondition`].
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `OCPI_VERSIONS_URL` | Own versions URL sent in credentials |
//! | `OCPI_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `OCPI_CONNECT_TIMEOUT` | Connect timeout in seconds (default: 10) |
//! | `OCPI_MAX_RETRIES` | Max retries for transient failures (default: 3) |
//! | `OCPI_ACCEPT_INVALID_CERTS` | Skip TLS validation (dev only) |

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod observe;
pub mod party;
pub mod retry;
pub mod transport;
pub mod types;

// Re-export main types
pub use cache::VersionCache;
pub use client::{OcpiClient, Resolution};
pub use codec::{Codec, JsonCodec};
pub use config::{ClientConfig, CLIENT_USER_AGENT};
pub use envelope::{ResponseEnvelope, TransportOutcome, WireEnvelope, SUCCESS_STATUS_CODE};
pub use error::{OcpiError, OcpiResult};
pub use observe::{
    ClientMetrics, MetricsSnapshot, Observer, ObserverList, Operation, RequestEvent,
    ResponseEvent,
};
pub use party::{
    AccessStatus, InMemoryPartyRegistry, PartyRegistry, PartyStatus, RemoteAccessInfo,
    RemoteParty, RemotePartyUpdate,
};
pub use retry::{is_retransmission_reason, RetryDelay, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use types::{
    AccessToken, BusinessDetails, Credentials, CredentialsRole, Endpoint, Image, ImageCategory,
    InterfaceRole, ModuleId, Role, VersionDetail, VersionId, VersionInformation,
};

pub use tokio_util::sync::CancellationToken;
