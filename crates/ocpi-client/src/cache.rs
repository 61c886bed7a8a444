//! In-memory cache of discovered versions.
//!
//! Two maps: version id -> discovery URL (replaced wholesale by a successful
//! version listing) and version id -> detail (upserted one entry at a time by
//! a successful detail fetch). Entries live as long as the client.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use url::Url;

use crate::types::{VersionDetail, VersionId, VersionInformation};

/// Concurrent version cache. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct VersionCache {
    inner: Arc<RwLock<VersionCacheInner>>,
}

#[derive(Debug, Default)]
struct VersionCacheInner {
    urls: BTreeMap<VersionId, Url>,
    details: BTreeMap<VersionId, VersionDetail>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole id -> URL map with exactly `versions`.
    pub async fn replace_urls(&self, versions: &[VersionInformation]) {
        let urls = versions
            .iter()
            .map(|v| (v.version.clone(), v.url.clone()))
            .collect();
        self.inner.write().await.urls = urls;
    }

    /// Insert or overwrite the detail of one version.
    pub async fn upsert_detail(&self, detail: VersionDetail) {
        self.inner
            .write()
            .await
            .details
            .insert(detail.version.clone(), detail);
    }

    pub async fn url(&self, version: &VersionId) -> Option<Url> {
        self.inner.read().await.urls.get(version).cloned()
    }

    pub async fn detail(&self, version: &VersionId) -> Option<VersionDetail> {
        self.inner.read().await.details.get(version).cloned()
    }

    /// Snapshot of the id -> URL map.
    pub async fn urls(&self) -> BTreeMap<VersionId, Url> {
        self.inner.read().await.urls.clone()
    }

    /// Snapshot of the id -> detail map.
    pub async fn details(&self) -> BTreeMap<VersionId, VersionDetail> {
        self.inner.read().await.details.clone()
    }

    /// Known version ids, ascending.
    pub async fn version_ids(&self) -> Vec<VersionId> {
        self.inner.read().await.urls.keys().cloned().collect()
    }

    /// Highest version with a cached URL.
    pub async fn max_url_version(&self) -> Option<VersionId> {
        self.inner.read().await.urls.keys().next_back().cloned()
    }

    /// Highest version with a cached detail.
    pub async fn max_detail_version(&self) -> Option<VersionId> {
        self.inner.read().await.details.keys().next_back().cloned()
    }
}
