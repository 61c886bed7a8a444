//! Remote parties and the registry that persists trust changes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::error::OcpiResult;
use crate::types::{AccessToken, CredentialsRole, VersionId};

/// How to reach a remote party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccessInfo {
    /// The party's versions (discovery) URL.
    pub versions_url: Url,

    /// Token we present to the party.
    pub access_token: AccessToken,

    /// Send the token base64 encoded in the `Authorization` header.
    #[serde(default)]
    pub base64_encode_token: bool,

    /// Overrides `ClientConfig::accept_invalid_certs` for this party.
    #[serde(default)]
    pub accept_invalid_certs: Option<bool>,
}

impl RemoteAccessInfo {
    pub fn new(versions_url: Url, access_token: AccessToken) -> Self {
        Self {
            versions_url,
            access_token,
            base64_encode_token: false,
            accept_invalid_certs: None,
        }
    }

    pub fn with_base64_token(mut self, encode: bool) -> Self {
        self.base64_encode_token = encode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyStatus {
    Enabled,
    Disabled,
}

/// Whether a token is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    Allowed,
    Blocked,
    Expired,
}

/// A known counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParty {
    /// Registry key.
    pub id: String,

    /// Roles the party declared when trust was last established.
    pub roles: Vec<CredentialsRole>,

    /// One or more ways to reach the party; the first one is used.
    pub access_infos: Vec<RemoteAccessInfo>,

    /// Token the party uses to call us, if one was issued.
    #[serde(default)]
    pub local_access_token: Option<AccessToken>,

    pub status: PartyStatus,
}

/// Write set for [`PartyRegistry::add_or_update_remote_party`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePartyUpdate {
    pub id: String,

    /// Roles the party now declares.
    pub roles: Vec<CredentialsRole>,

    /// Token the party uses to call us.
    pub access_token: AccessToken,

    /// Token we use to call the party.
    pub remote_access_token: AccessToken,

    pub remote_versions_url: Url,

    /// Versions the party offers, ascending.
    pub remote_version_ids: Vec<VersionId>,

    pub selected_version: Option<VersionId>,

    pub access_status: AccessStatus,

    pub remote_access_status: AccessStatus,

    pub party_status: PartyStatus,

    pub updated_at: DateTime<Utc>,
}

/// Persistent registry of remote parties.
#[async_trait]
pub trait PartyRegistry: Send + Sync + std::fmt::Debug {
    async fn add_or_update_remote_party(&self, update: RemotePartyUpdate) -> OcpiResult<()>;

    async fn get_remote_party(&self, id: &str) -> OcpiResult<Option<RemotePartyUpdate>>;
}

/// Registry kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPartyRegistry {
    parties: Arc<RwLock<HashMap<String, RemotePartyUpdate>>>,
}

impl InMemoryPartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.parties.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.parties.read().await.is_empty()
    }
}

#[async_trait]
impl PartyRegistry for InMemoryPartyRegistry {
    async fn add_or_update_remote_party(&self, update: RemotePartyUpdate) -> OcpiResult<()> {
        tracing::debug!(party = %update.id, "storing remote party");
        self.parties.write().await.insert(update.id.clone(), update);
        Ok(())
    }

    async fn get_remote_party(&self, id: &str) -> OcpiResult<Option<RemotePartyUpdate>> {
        Ok(self.parties.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BusinessDetails, Role};

    fn update(id: &str, token: &str) -> RemotePartyUpdate {
        RemotePartyUpdate {
            id: id.to_string(),
            roles: vec![CredentialsRole::new(
                "NL",
                "ABC",
                Role::Cpo,
                BusinessDetails::named("ABC"),
            )],
            access_token: AccessToken::new("ours"),
            remote_access_token: AccessToken::new(token),
            remote_versions_url: "https://cpo.example/versions".parse().unwrap(),
            remote_version_ids: vec![VersionId::from("2.2.1")],
            selected_version: Some(VersionId::from("2.2.1")),
            access_status: AccessStatus::Allowed,
            remote_access_status: AccessStatus::Allowed,
            party_status: PartyStatus::Enabled,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_registry_upserts_by_id() {
        let registry = InMemoryPartyRegistry::new();
        assert!(registry.is_empty().await);

        registry
            .add_or_update_remote_party(update("NL-ABC", "t1"))
            .await
            .unwrap();
        registry
            .add_or_update_remote_party(update("NL-ABC", "t2"))
            .await
            .unwrap();

        assert_eq!(registry.len().await, 1);
        let stored = registry.get_remote_party("NL-ABC").await.unwrap().unwrap();
        assert_eq!(stored.remote_access_token, AccessToken::new("t2"));
        assert!(registry.get_remote_party("DE-XYZ").await.unwrap().is_none());
    }

    #[test]
    fn test_remote_party_deserializes_with_defaults() {
        let party: RemoteParty = serde_json::from_value(serde_json::json!({
            "id": "NL-ABC",
            "roles": [],
            "access_infos": [{
                "versions_url": "https://cpo.example/versions",
                "access_token": "token-a"
            }],
            "status": "ENABLED"
        }))
        .unwrap();

        assert!(party.local_access_token.is_none());
        assert!(!party.access_infos[0].base64_encode_token);
        assert_eq!(party.status, PartyStatus::Enabled);
    }
}
