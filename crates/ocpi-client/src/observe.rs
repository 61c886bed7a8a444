//! Fire-and-forget request/response hooks.
//!
//! Observers never influence an operation: errors and panics raised by a
//! hook are logged and dropped.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use url::Url;

/// Protocol operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListVersions,
    GetVersionDetail,
    FetchCredentials,
    CreateCredentials,
    UpdateCredentials,
    RemoveCredentials,
    Register,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListVersions => "list_versions",
            Self::GetVersionDetail => "get_version_detail",
            Self::FetchCredentials => "fetch_credentials",
            Self::CreateCredentials => "create_credentials",
            Self::UpdateCredentials => "update_credentials",
            Self::RemoveCredentials => "remove_credentials",
            Self::Register => "register",
        };
        f.write_str(name)
    }
}

/// Emitted before every network attempt.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub operation: Operation,
    pub method: String,
    pub url: Url,
    pub request_id: String,
    pub correlation_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    pub sent_at: DateTime<Utc>,
}

/// Emitted once per operation, after the last attempt.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub operation: Operation,
    pub request_id: Option<String>,
    pub correlation_id: String,
    pub http_status: Option<u16>,
    pub status_code: Option<u32>,
    pub success: bool,
    pub cancelled: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Observability hook.
pub trait Observer: Send + Sync {
    fn on_request(&self, _event: &RequestEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_response(&self, _event: &ResponseEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fan-out to registered observers.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn request(&self, event: &RequestEvent) {
        for observer in &self.observers {
            report(
                "on_request",
                catch_unwind(AssertUnwindSafe(|| observer.on_request(event))),
            );
        }
    }

    pub fn response(&self, event: &ResponseEvent) {
        for observer in &self.observers {
            report(
                "on_response",
                catch_unwind(AssertUnwindSafe(|| observer.on_response(event))),
            );
        }
    }
}

fn report(hook: &str, result: std::thread::Result<anyhow::Result<()>>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(hook, error = %e, "observer hook failed"),
        Err(_) => warn!(hook, "observer hook panicked"),
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Per-client request/response counters.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    requests: AtomicU64,
    retries: AtomicU64,
    responses: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cancellations: AtomicU64,
}

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Network attempts started.
    pub requests: u64,
    /// Attempts after the first one of an operation.
    pub retries: u64,
    /// Operations completed.
    pub responses: u64,
    pub successes: u64,
    pub failures: u64,
    pub cancellations: u64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

impl Observer for ClientMetrics {
    fn on_request(&self, event: &RequestEvent) -> anyhow::Result<()> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if event.attempt > 1 {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn on_response(&self, event: &ResponseEvent) -> anyhow::Result<()> {
        self.responses.fetch_add(1, Ordering::Relaxed);
        if event.success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if event.cancelled {
            self.cancellations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}
