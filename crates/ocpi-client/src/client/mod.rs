//! OCPI client engine for one remote party.
//!
//! Public API: no status code knowledge. All HTTP/status mapping lives in
//! `http.rs`; operations live in `discovery.rs`, `credentials.rs` and
//! `registration.rs`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderValue;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::cache::VersionCache;
use crate::codec::{Codec, JsonCodec};
use crate::config::ClientConfig;
use crate::error::{OcpiError, OcpiResult};
use crate::observe::{ClientMetrics, MetricsSnapshot, Observer, ObserverList};
use crate::party::{
    AccessStatus, PartyRegistry, PartyStatus, RemoteAccessInfo, RemoteParty, RemotePartyUpdate,
};
use crate::retry::{RetryDelay, RetryPolicy};
use crate::transport::{HttpTransport, Transport};
use crate::types::{AccessToken, Credentials, CredentialsRole, VersionId};

mod credentials;
mod discovery;
mod http;
mod registration;
mod validate;

pub use discovery::Resolution;

use http::{Bearer, HttpBackend};

/// Mutable per-client fields. Each is its own lock: updates are
/// last-write-wins per field, with no cross-field atomicity.
#[derive(Debug)]
struct ClientState {
    selected_version: RwLock<Option<VersionId>>,
    bearer: RwLock<Bearer>,
    local_token: RwLock<AccessToken>,
}

/// Client for discovery, credentials exchange and registration with one
/// remote party. Clones share caches and state.
#[derive(Debug, Clone)]
pub struct OcpiClient {
    http: HttpBackend,
    cache: VersionCache,
    state: Arc<ClientState>,
    remote: Arc<RemoteParty>,
    access: RemoteAccessInfo,
    own_versions_url: Url,
    own_roles: Arc<Vec<CredentialsRole>>,
    registry: Arc<dyn PartyRegistry>,
    metrics: Arc<ClientMetrics>,
}

impl OcpiClient {
    /// Create a client using the reqwest transport.
    pub fn new(
        config: ClientConfig,
        remote: RemoteParty,
        registry: Arc<dyn PartyRegistry>,
    ) -> OcpiResult<Self> {
        let access = primary_access(&remote)?;
        let mut transport_config = config.clone();
        if let Some(accept) = access.accept_invalid_certs {
            transport_config.accept_invalid_certs = accept;
        }
        let transport = HttpTransport::new(&transport_config)?;

        Self::with_transport(config, remote, registry, Arc::new(transport))
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        remote: RemoteParty,
        registry: Arc<dyn PartyRegistry>,
        transport: Arc<dyn Transport>,
    ) -> OcpiResult<Self> {
        let access = primary_access(&remote)?.clone();

        let own_versions_url = config
            .versions_url
            .as_deref()
            .ok_or_else(|| OcpiError::precondition("own versions URL is not configured"))
            .and_then(|u| {
                Url::parse(u).map_err(|e| {
                    OcpiError::precondition(format!("invalid own versions URL {}: {}", u, e))
                })
            })?;

        if config.roles.is_empty() {
            return Err(OcpiError::precondition("no own roles configured"));
        }

        let bearer = Bearer::new(access.access_token.clone(), access.base64_encode_token)
            .map_err(|e| OcpiError::precondition(e.to_string()))?;

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| OcpiError::precondition(format!("invalid user agent: {}", e)))?;

        let local_token = remote
            .local_access_token
            .clone()
            .unwrap_or_else(AccessToken::generate);

        let metrics = Arc::new(ClientMetrics::new());
        let mut observers = ObserverList::new();
        observers.push(metrics.clone());

        let retry = RetryPolicy::new(config.max_retries)
            .with_retry_on_transport_error(config.retry_on_transport_error);

        Ok(Self {
            http: HttpBackend {
                transport,
                codec: Arc::new(JsonCodec),
                retry,
                timeout: Duration::from_secs(config.timeout_secs),
                user_agent,
                observers,
            },
            cache: VersionCache::new(),
            state: Arc::new(ClientState {
                selected_version: RwLock::new(None),
                bearer: RwLock::new(bearer),
                local_token: RwLock::new(local_token),
            }),
            remote: Arc::new(remote),
            access,
            own_versions_url,
            own_roles: Arc::new(config.roles),
            registry,
            metrics,
        })
    }

    /// Replace the wire codec.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.http.codec = codec;
        self
    }

    /// Inject the delay applied between retries.
    pub fn with_retry_delay(mut self, delay: RetryDelay) -> Self {
        self.http.retry = self.http.retry.with_delay(delay);
        self
    }

    /// Register an observability hook.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.http.observers.push(observer);
        self
    }

    pub fn version_cache(&self) -> &VersionCache {
        &self.cache
    }

    pub fn remote_party(&self) -> &RemoteParty {
        &self.remote
    }

    pub async fn selected_version(&self) -> Option<VersionId> {
        self.state.selected_version.read().await.clone()
    }

    /// Pin the version used when callers do not pass one.
    pub async fn set_selected_version(&self, version: VersionId) {
        debug!(version = %version, "selecting version");
        *self.state.selected_version.write().await = Some(version);
    }

    /// Put back a selection captured earlier, including "none".
    async fn restore_selected_version(&self, version: Option<VersionId>) {
        let mut selected = self.state.selected_version.write().await;
        if *selected != version {
            debug!(restored = ?version, discarded = ?*selected, "restoring selected version");
            *selected = version;
        }
    }

    /// Token currently presented to the remote party.
    pub async fn current_token(&self) -> AccessToken {
        self.state.bearer.read().await.token().clone()
    }

    /// `Authorization` header value derived from [`Self::current_token`].
    pub async fn authorization_header(&self) -> String {
        self.state
            .bearer
            .read()
            .await
            .header()
            .to_str()
            .map(String::from)
            .unwrap_or_default()
    }

    /// Token last offered to the remote party for calling us.
    pub async fn local_token(&self) -> AccessToken {
        self.state.local_token.read().await.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn bearer(&self) -> Bearer {
        self.state.bearer.read().await.clone()
    }

    /// Adopt a new outbound token; raw and header forms change together.
    async fn rotate_bearer(&self, token: AccessToken) -> OcpiResult<()> {
        let mut bearer = self.state.bearer.write().await;
        *bearer = bearer.rotate(token)?;
        Ok(())
    }

    /// Credentials document describing this party.
    fn own_credentials(&self, token: AccessToken) -> Credentials {
        Credentials {
            token,
            url: self.own_versions_url.clone(),
            roles: self.own_roles.as_ref().clone(),
        }
    }

    /// Roles the party declared when trust was last established.
    async fn known_roles(&self) -> Vec<CredentialsRole> {
        match self.registry.get_remote_party(&self.remote.id).await {
            Ok(Some(stored)) => stored.roles,
            Ok(None) => self.remote.roles.clone(),
            Err(e) => {
                warn!(party = %self.remote.id, error = %e, "registry lookup failed, using initial roles");
                self.remote.roles.clone()
            }
        }
    }

    /// Persist the counterpart's new trust state.
    async fn persist_party(
        &self,
        returned: &Credentials,
        local_token: AccessToken,
        selected_version: Option<VersionId>,
    ) {
        let update = RemotePartyUpdate {
            id: self.remote.id.clone(),
            roles: returned.roles.clone(),
            access_token: local_token,
            remote_access_token: returned.token.clone(),
            remote_versions_url: returned.url.clone(),
            remote_version_ids: self.cache.version_ids().await,
            selected_version,
            access_status: AccessStatus::Allowed,
            remote_access_status: AccessStatus::Allowed,
            party_status: PartyStatus::Enabled,
            updated_at: Utc::now(),
        };

        if let Err(e) = self.registry.add_or_update_remote_party(update).await {
            warn!(party = %self.remote.id, error = %e, "failed to persist remote party");
        }
    }
}

fn primary_access(remote: &RemoteParty) -> OcpiResult<&RemoteAccessInfo> {
    remote.access_infos.first().ok_or_else(|| {
        OcpiError::precondition(format!("remote party {} has no access info", remote.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::InMemoryPartyRegistry;
    use crate::types::{BusinessDetails, Role};

    fn config() -> ClientConfig {
        ClientConfig::default()
            .with_versions_url("https://emsp.example/ocpi/versions")
            .with_role(CredentialsRole::new(
                "DE",
                "EXA",
                Role::Emsp,
                BusinessDetails::named("Example eMSP"),
            ))
    }

    fn remote(access_infos: Vec<RemoteAccessInfo>) -> RemoteParty {
        RemoteParty {
            id: "NL-ABC".to_string(),
            roles: Vec::new(),
            access_infos,
            local_access_token: Some(AccessToken::new("ours")),
            status: PartyStatus::Enabled,
        }
    }

    fn access(base64: bool) -> RemoteAccessInfo {
        RemoteAccessInfo::new(
            "https://cpo.example/ocpi/versions".parse().unwrap(),
            AccessToken::new("token-a"),
        )
        .with_base64_token(base64)
    }

    #[test]
    fn test_new_requires_access_info() {
        let result = OcpiClient::new(
            config(),
            remote(Vec::new()),
            Arc::new(InMemoryPartyRegistry::new()),
        );
        assert!(matches!(result, Err(OcpiError::Precondition { .. })));
    }

    #[test]
    fn test_new_requires_own_versions_url_and_roles() {
        let registry = Arc::new(InMemoryPartyRegistry::new());

        let no_url = ClientConfig {
            versions_url: None,
            ..config()
        };
        assert!(OcpiClient::new(no_url, remote(vec![access(false)]), registry.clone()).is_err());

        let no_roles = ClientConfig {
            roles: Vec::new(),
            ..config()
        };
        assert!(OcpiClient::new(no_roles, remote(vec![access(false)]), registry).is_err());
    }

    #[tokio::test]
    async fn test_initial_state() {
        let client = OcpiClient::new(
            config(),
            remote(vec![access(true)]),
            Arc::new(InMemoryPartyRegistry::new()),
        )
        .unwrap();

        assert!(client.selected_version().await.is_none());
        assert_eq!(client.current_token().await, AccessToken::new("token-a"));
        assert_eq!(client.authorization_header().await, "Token dG9rZW4tYQ==");
        assert_eq!(client.local_token().await, AccessToken::new("ours"));
    }

    #[tokio::test]
    async fn test_rotate_bearer_updates_both_forms() {
        let client = OcpiClient::new(
            config(),
            remote(vec![access(false)]),
            Arc::new(InMemoryPartyRegistry::new()),
        )
        .unwrap();

        client.rotate_bearer(AccessToken::new("token-c")).await.unwrap();

        assert_eq!(client.current_token().await, AccessToken::new("token-c"));
        assert_eq!(client.authorization_header().await, "Token token-c");
    }
}
