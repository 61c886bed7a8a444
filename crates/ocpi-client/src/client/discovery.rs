//! Version listing, version detail and the endpoint resolution cascade.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::envelope::ResponseEnvelope;
use crate::error::OcpiError;
use crate::observe::Operation;
use crate::types::{InterfaceRole, ModuleId, VersionDetail, VersionId, VersionInformation};

use super::http::Call;
use super::OcpiClient;

/// Outcome of endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No version could be determined.
    NoVersion,

    /// A version was determined but exposes no matching endpoint
    /// (or its detail is not cached).
    NoEndpoint(VersionId),

    /// Cancellation was observed before a version or endpoint was settled.
    Cancelled,

    Found { version: VersionId, url: Url },
}

impl Resolution {
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Found { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Configuration error for callers that need an endpoint.
    pub(crate) fn into_endpoint(
        self,
        module: &ModuleId,
        role: InterfaceRole,
    ) -> Result<(VersionId, Url), OcpiError> {
        match self {
            Self::Found { version, url } => Ok((version, url)),
            Self::NoVersion => Err(OcpiError::configuration(
                "no version identification available",
            )),
            Self::Cancelled => Err(OcpiError::Cancelled),
            Self::NoEndpoint(version) => Err(OcpiError::configuration(format!(
                "no {} {:?} endpoint for version {}",
                module, role, version
            ))),
        }
    }
}

impl OcpiClient {
    /// List the versions the remote party supports.
    ///
    /// On success the cached version -> URL map is replaced by exactly the
    /// returned set.
    pub async fn list_versions(&self) -> ResponseEnvelope<Vec<VersionInformation>> {
        self.list_versions_with_cancel(&CancellationToken::new())
            .await
    }

    pub async fn list_versions_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<Vec<VersionInformation>> {
        let bearer = self.bearer().await;
        let call = Call::get(Operation::ListVersions, self.access.versions_url.clone());

        let envelope = self
            .http
            .execute(call, &bearer, cancel, |codec, body| {
                codec.parse_version_information_list(body)
            })
            .await;

        if let Some(versions) = envelope.success_data() {
            debug!(count = versions.len(), "caching version list");
            self.cache.replace_urls(versions).await;
        }

        envelope
    }

    /// Fetch the endpoints of one version.
    ///
    /// Without `version` the selected version is used. Lists versions first
    /// when the version's URL is not cached yet.
    pub async fn get_version_detail(
        &self,
        version: Option<VersionId>,
        set_as_default: bool,
    ) -> ResponseEnvelope<VersionDetail> {
        self.get_version_detail_with_cancel(version, set_as_default, &CancellationToken::new())
            .await
    }

    pub async fn get_version_detail_with_cancel(
        &self,
        version: Option<VersionId>,
        set_as_default: bool,
        cancel: &CancellationToken,
    ) -> ResponseEnvelope<VersionDetail> {
        let version = match version {
            Some(v) => v,
            None => match self.selected_version().await {
                Some(v) => v,
                None => {
                    return ResponseEnvelope::not_attempted(OcpiError::configuration(
                        "no version identification available",
                    ))
                }
            },
        };

        let url = match self.cache.url(&version).await {
            Some(url) => url,
            None => {
                let listing = self.list_versions_with_cancel(cancel).await;
                if let Some(e) = &listing.error {
                    debug!(error = %e, "version listing failed during detail fetch");
                }
                if cancel.is_cancelled() {
                    return ResponseEnvelope::not_attempted(OcpiError::Cancelled);
                }
                match self.cache.url(&version).await {
                    Some(url) => url,
                    None => {
                        return ResponseEnvelope::not_attempted(OcpiError::configuration(
                            format!("unknown version identification {}", version),
                        ))
                    }
                }
            }
        };

        let bearer = self.bearer().await;
        let envelope = self
            .http
            .execute(
                Call::get(Operation::GetVersionDetail, url),
                &bearer,
                cancel,
                |codec, body| codec.parse_version_detail(body),
            )
            .await;

        if let Some(detail) = envelope.success_data() {
            let mut detail = detail.clone();
            if detail.version != version {
                warn!(
                    requested = %version,
                    returned = %detail.version,
                    "version detail reports a different version, keeping requested id"
                );
                detail.version = version.clone();
            }
            self.cache.upsert_detail(detail).await;
            if set_as_default {
                self.set_selected_version(version).await;
            }
        }

        envelope
    }

    /// URL of the first endpoint matching `module` and `role`.
    ///
    /// May list versions and fetch a detail when nothing is known yet.
    /// `None` is an absence, not an error.
    pub async fn resolve_endpoint(
        &self,
        module: &ModuleId,
        role: InterfaceRole,
        version: Option<VersionId>,
    ) -> Option<Url> {
        self.resolve(module, role, version, &CancellationToken::new())
            .await
            .url()
            .cloned()
    }

    /// Resolution cascade:
    /// 1. explicit version, else the selected one;
    /// 2. else the highest version with a cached detail (selected, no I/O);
    /// 3. else list versions, select the highest and fetch its detail;
    /// 4. scan the cached detail of the version for the endpoint.
    ///
    /// A cancelled `cancel` short-circuits to [`Resolution::Cancelled`].
    pub async fn resolve(
        &self,
        module: &ModuleId,
        role: InterfaceRole,
        version: Option<VersionId>,
        cancel: &CancellationToken,
    ) -> Resolution {
        if cancel.is_cancelled() {
            return Resolution::Cancelled;
        }

        let mut version = match version {
            Some(v) => Some(v),
            None => self.selected_version().await,
        };

        if version.is_none() {
            if let Some(max) = self.cache.max_detail_version().await {
                self.set_selected_version(max.clone()).await;
                version = Some(max);
            }
        }

        if version.is_none() {
            let listing = self.list_versions_with_cancel(cancel).await;
            if let Some(e) = &listing.error {
                debug!(error = %e, "version listing failed during endpoint resolution");
            }
            if let Some(max) = self.cache.max_url_version().await {
                self.set_selected_version(max.clone()).await;
                let detail = self
                    .get_version_detail_with_cancel(Some(max.clone()), true, cancel)
                    .await;
                if let Some(e) = &detail.error {
                    debug!(version = %max, error = %e, "version detail fetch failed");
                }
                version = Some(max);
            }
            if cancel.is_cancelled() {
                debug!("endpoint resolution cancelled");
                return Resolution::Cancelled;
            }
        }

        let Some(version) = version else {
            return Resolution::NoVersion;
        };

        let url = self
            .cache
            .detail(&version)
            .await
            .and_then(|d| d.endpoint(module, role).map(|e| e.url.clone()));

        match url {
            Some(url) => Resolution::Found { version, url },
            None => {
                debug!(module = %module, role = ?role, version = %version, "endpoint not found");
                Resolution::NoEndpoint(version)
            }
        }
    }
}
