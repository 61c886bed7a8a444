//! Registration handshake.
//!
//! We call the counterpart with the pre-shared token (A), hand it a fresh
//! token (B) for calling us, and receive its final token (C) for calling it.
//! Trust state changes only after the whole exchange succeeded and the
//! counterpart's roles validated; any failure leaves it untouched, including
//! a version the resolution cascade selected on the way.

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::envelope::ResponseEnvelope;
use crate::observe::Operation;
use crate::types::{AccessToken, Credentials, VersionId};

use super::http::Call;
use super::validate::validate_roles;
use super::OcpiClient;

impl OcpiClient {
    /// Register with the remote party.
    ///
    /// `token_b` pins the token offered to the counterpart; a fresh one is
    /// generated when absent, so every call mints a new token.
    pub async fn register(
        &self,
        version: Option<VersionId>,
        token_b: Option<AccessToken>,
    ) -> ResponseEnvelope<Credentials> {
        self.register_with_cancel(version, token_b, &CancellationToken::new())
            .await
    }

    pub async fn register_with_cancel(
        &self,
        version: Option<VersionId>,
        token_b: Option<AccessToken>,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Credentials> {
        let token_b = token_b.unwrap_or_else(AccessToken::generate);
        let prior_version = self.selected_version().await;

        let (version, url) = match self.credentials_endpoint(version, cancel).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.restore_selected_version(prior_version).await;
                return ResponseEnvelope::not_attempted(e);
            }
        };

        let document = self.own_credentials(token_b.clone());
        let body = match self.http.codec.credentials_to_bytes(&document) {
            Ok(body) => body,
            Err(e) => {
                self.restore_selected_version(prior_version).await;
                return ResponseEnvelope::not_attempted(e);
            }
        };

        let bearer = self.bearer().await;
        let envelope = self
            .http
            .execute(
                Call::with_body(Operation::Register, Method::POST, url, body),
                &bearer,
                cancel,
                |codec, body| codec.parse_credentials(body),
            )
            .await;

        let Some(returned) = envelope.success_data().cloned() else {
            warn!(
                party = %self.remote.id,
                error = ?envelope.error,
                "registration failed, trust state unchanged"
            );
            self.restore_selected_version(prior_version).await;
            return envelope;
        };

        let known = self.known_roles().await;
        if let Err(e) = validate_roles(&known, &returned.roles) {
            warn!(
                party = %self.remote.id,
                error = %e,
                "counterpart roles do not match, registration not committed"
            );
            self.restore_selected_version(prior_version).await;
            return envelope;
        }

        if let Err(e) = self.rotate_bearer(returned.token.clone()).await {
            warn!(party = %self.remote.id, error = %e, "cannot adopt counterpart token");
            self.restore_selected_version(prior_version).await;
            return envelope;
        }
        *self.state.local_token.write().await = token_b.clone();
        self.set_selected_version(version.clone()).await;

        self.persist_party(&returned, token_b, Some(version.clone()))
            .await;
        info!(party = %self.remote.id, version = %version, "registration completed");

        envelope
    }
}
