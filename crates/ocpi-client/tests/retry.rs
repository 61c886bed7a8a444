//! Integration tests for retransmission, cancellation and observers.
//!
//! Uses a scripted transport so attempt counts are exact.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use ocpi_client::{
    CancellationToken, ClientConfig, InterfaceRole, ModuleId, Observer, OcpiError, RequestEvent,
    Resolution, ResponseEvent, RetryDelay, TransportOutcome, VersionId,
};
use serde_json::json;

fn retrying_config(max_retries: u32) -> ClientConfig {
    config().with_max_retries(max_retries)
}

fn versions() -> serde_json::Value {
    ok(json!([{"version": "2.2.1", "url": "https://cpo.example/ocpi/2.2.1"}]))
}

#[tokio::test]
async fn test_transient_status_is_retried_until_exhausted() {
    let transport = Arc::new(
        ScriptedTransport::new().always(raw_response(503, "Service Unavailable")),
    );
    let (client, _) = scripted_client(transport.clone(), retrying_config(2));

    let response = client.list_versions().await;

    assert_eq!(transport.requests().len(), 3);
    assert_eq!(response.attempts, 3);
    assert_eq!(response.http_status(), Some(503));
    assert!(matches!(response.error, Some(OcpiError::Transport { .. })));

    let metrics = client.metrics();
    assert_eq!(metrics.requests, 3);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.responses, 1);
    assert_eq!(metrics.failures, 1);
}

#[tokio::test]
async fn test_retry_stops_on_success() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then(raw_response(502, "Bad Gateway"))
            .then(connection_refused())
            .then(response(200, &versions())),
    );
    let (client, _) = scripted_client(transport.clone(), retrying_config(5));

    let response = client.list_versions().await;

    assert!(response.is_success(), "listing failed: {:?}", response.error);
    assert_eq!(response.attempts, 3);
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(client.version_cache().version_ids().await.len(), 1);
}

#[tokio::test]
async fn test_non_transient_status_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new().always(response(
        401,
        &json!({"status_code": 2001, "status_message": "Invalid token"}),
    )));
    let (client, _) = scripted_client(transport.clone(), retrying_config(3));

    let response = client.list_versions().await;

    assert_eq!(transport.requests().len(), 1);
    assert_eq!(response.status_code, Some(2001));
}

#[tokio::test]
async fn test_transport_errors_not_retried_when_disabled() {
    let transport = Arc::new(ScriptedTransport::new().always(connection_refused()));
    let config = retrying_config(3).with_retry_on_transport_error(false);
    let (client, _) = scripted_client(transport.clone(), config);

    let response = client.list_versions().await;

    assert_eq!(transport.requests().len(), 1);
    assert!(matches!(
        response.transport,
        TransportOutcome::Failed { .. }
    ));
    assert!(matches!(response.error, Some(OcpiError::Transport { .. })));
}

#[tokio::test]
async fn test_retry_delay_receives_retry_number() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let transport = Arc::new(ScriptedTransport::new().always(raw_response(429, "slow down")));
    let (client, _) = scripted_client(transport, retrying_config(3));
    let client = client.with_retry_delay(RetryDelay::from_fn(move |n| {
        recorder.lock().unwrap().push(n);
        Duration::from_millis(1)
    }));

    client.list_versions().await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_attempt() {
    let transport = Arc::new(ScriptedTransport::new().always(response(200, &versions())));
    let (client, _) = scripted_client(transport.clone(), retrying_config(3));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let response = client.list_versions_with_cancel(&cancel).await;

    assert!(transport.requests().is_empty());
    assert_eq!(response.error, Some(OcpiError::Cancelled));
    assert_eq!(response.transport, TransportOutcome::Cancelled);
    assert_eq!(client.metrics().cancellations, 1);
}

#[tokio::test]
async fn test_cancelled_discovery_is_reported_as_cancellation() {
    let transport = Arc::new(ScriptedTransport::new().always(response(200, &versions())));
    let (client, registry) = scripted_client(transport.clone(), retrying_config(3));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let registered = client.register_with_cancel(None, None, &cancel).await;
    assert_eq!(registered.error, Some(OcpiError::Cancelled));
    assert_eq!(registered.transport, TransportOutcome::Cancelled);

    let fetched = client.fetch_credentials_with_cancel(None, &cancel).await;
    assert_eq!(fetched.error, Some(OcpiError::Cancelled));

    let detail = client
        .get_version_detail_with_cancel(Some(VersionId::from("2.2.1")), true, &cancel)
        .await;
    assert_eq!(detail.error, Some(OcpiError::Cancelled));

    let resolution = client
        .resolve(&ModuleId::Credentials, InterfaceRole::Receiver, None, &cancel)
        .await;
    assert_eq!(resolution, Resolution::Cancelled);

    assert!(transport.requests().is_empty());
    assert!(client.selected_version().await.is_none());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_cancel_during_backoff_stops_retrying() {
    let transport = Arc::new(ScriptedTransport::new().always(raw_response(503, "busy")));
    let (client, _) = scripted_client(transport.clone(), retrying_config(5));
    let client = client.with_retry_delay(RetryDelay::fixed(Duration::from_secs(30)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        client.list_versions_with_cancel(&cancel),
    )
    .await
    .expect("cancellation should interrupt the backoff");

    assert_eq!(transport.requests().len(), 1);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.error, Some(OcpiError::Cancelled));
}

#[tokio::test]
async fn test_attempts_share_correlation_id() {
    let transport = Arc::new(ScriptedTransport::new().always(raw_response(500, "oops")));
    let (client, _) = scripted_client(transport.clone(), retrying_config(1));

    let response = client.list_versions().await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);

    let request_ids: Vec<_> = requests
        .iter()
        .map(|r| r.headers["x-request-id"].to_str().unwrap().to_string())
        .collect();
    let correlation_ids: Vec<_> = requests
        .iter()
        .map(|r| r.headers["x-correlation-id"].to_str().unwrap().to_string())
        .collect();

    assert_ne!(request_ids[0], request_ids[1]);
    assert_eq!(correlation_ids[0], correlation_ids[1]);
    assert_eq!(response.request_id.as_deref(), Some(request_ids[1].as_str()));
    assert_eq!(
        response.correlation_id.as_deref(),
        Some(correlation_ids[0].as_str())
    );
    assert_eq!(
        requests[0].headers["authorization"].to_str().unwrap(),
        "Token token-a"
    );
}

#[derive(Default)]
struct FaultyObserver {
    requests: AtomicU32,
}

impl Observer for FaultyObserver {
    fn on_request(&self, _event: &RequestEvent) -> anyhow::Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("sink unavailable")
    }

    fn on_response(&self, _event: &ResponseEvent) -> anyhow::Result<()> {
        panic!("observer bug")
    }
}

#[tokio::test]
async fn test_failing_observer_does_not_affect_operation() {
    let transport = Arc::new(ScriptedTransport::new().always(response(200, &versions())));
    let observer = Arc::new(FaultyObserver::default());
    let (client, _) = scripted_client(transport, retrying_config(0));
    let client = client.with_observer(observer.clone());

    let response = client.list_versions().await;

    assert!(response.is_success());
    assert_eq!(observer.requests.load(Ordering::SeqCst), 1);
    assert_eq!(client.metrics().successes, 1);
}
