//! Credentials exchange: fetch, create, update and remove.
//!
//! Every operation first resolves the remote credentials RECEIVER endpoint
//! and fails without network traffic when that is impossible.

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::envelope::ResponseEnvelope;
use crate::error::OcpiError;
use crate::observe::Operation;
use crate::types::{Credentials, InterfaceRole, ModuleId, VersionId};

use super::http::Call;
use super::validate::validate_roles;
use super::OcpiClient;

impl OcpiClient {
    /// Resolve the remote credentials endpoint.
    pub(crate) async fn credentials_endpoint(
        &self,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> Result<(VersionId, Url), OcpiError> {
        let module = ModuleId::Credentials;
        let role = InterfaceRole::Receiver;
        self.resolve(&module, role, version, cancel)
            .await
            .into_endpoint(&module, role)
    }

    /// Read the credentials the remote party holds for us.
    pub async fn fetch_credentials(
        &self,
        version: Option<VersionId>,
    ) -> ResponseEnvelope<Credentials> {
        self.fetch_credentials_with_cancel(version, &CancellationToken::new())
            .await
    }

    pub async fn fetch_credentials_with_cancel(
        &self,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Credentials> {
        let (_, url) = match self.credentials_endpoint(version, cancel).await {
            Ok(endpoint) => endpoint,
            Err(e) => return ResponseEnvelope::not_attempted(e),
        };

        let bearer = self.bearer().await;
        self.http
            .execute(
                Call::get(Operation::FetchCredentials, url),
                &bearer,
                cancel,
                |codec, body| codec.parse_credentials(body),
            )
            .await
    }

    /// Send our credentials to the remote party (POST).
    ///
    /// The returned credentials are handed back; the outbound token is not
    /// rotated.
    pub async fn create_credentials(
        &self,
        version: Option<VersionId>,
    ) -> ResponseEnvelope<Credentials> {
        self.create_credentials_with_cancel(version, &CancellationToken::new())
            .await
    }

    pub async fn create_credentials_with_cancel(
        &self,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Credentials> {
        self.send_own_credentials(Operation::CreateCredentials, Method::POST, version, cancel)
            .await
    }

    /// Replace our credentials at the remote party (PUT).
    ///
    /// When the returned roles pass role validation, the returned token
    /// becomes the outbound bearer and the party's new state is persisted.
    /// A validation failure only skips those steps; the envelope still
    /// reports the exchange.
    pub async fn update_credentials(
        &self,
        version: Option<VersionId>,
    ) -> ResponseEnvelope<Credentials> {
        self.update_credentials_with_cancel(version, &CancellationToken::new())
            .await
    }

    pub async fn update_credentials_with_cancel(
        &self,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Credentials> {
        let envelope = self
            .send_own_credentials(Operation::UpdateCredentials, Method::PUT, version, cancel)
            .await;

        let Some(returned) = envelope.success_data().cloned() else {
            return envelope;
        };

        let known = self.known_roles().await;
        if let Err(e) = validate_roles(&known, &returned.roles) {
            warn!(
                party = %self.remote.id,
                error = %e,
                "credentials update returned unexpected roles, keeping current token"
            );
            return envelope;
        }

        if let Err(e) = self.rotate_bearer(returned.token.clone()).await {
            warn!(party = %self.remote.id, error = %e, "cannot adopt returned token");
            return envelope;
        }

        let local_token = self.local_token().await;
        let selected = self.selected_version().await;
        self.persist_party(&returned, local_token, selected).await;
        info!(party = %self.remote.id, "credentials updated, token rotated");

        envelope
    }

    /// Delete our credentials at the remote party.
    pub async fn remove_credentials(&self, version: Option<VersionId>) -> ResponseEnvelope<()> {
        self.remove_credentials_with_cancel(version, &CancellationToken::new())
            .await
    }

    pub async fn remove_credentials_with_cancel(
        &self,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<()> {
        let (_, url) = match self.credentials_endpoint(version, cancel).await {
            Ok(endpoint) => endpoint,
            Err(e) => return ResponseEnvelope::not_attempted(e),
        };

        let bearer = self.bearer().await;
        self.http
            .execute(
                Call::delete(Operation::RemoveCredentials, url),
                &bearer,
                cancel,
                |codec, body| codec.parse_status(body),
            )
            .await
    }

    async fn send_own_credentials(
        &self,
        operation: Operation,
        method: Method,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Credentials> {
        let (_, url) = match self.credentials_endpoint(version, cancel).await {
            Ok(endpoint) => endpoint,
            Err(e) => return ResponseEnvelope::not_attempted(e),
        };

        let document = self.own_credentials(self.local_token().await);
        let body = match self.http.codec.credentials_to_bytes(&document) {
            Ok(body) => body,
            Err(e) => return ResponseEnvelope::not_attempted(e),
        };

        let bearer = self.bearer().await;
        self.http
            .execute(
                Call::with_body(operation, method, url, body),
                &bearer,
                cancel,
                |codec, body| codec.parse_credentials(body),
            )
            .await
    }
}
