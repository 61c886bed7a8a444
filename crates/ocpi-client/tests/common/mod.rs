//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ocpi_client::{
    AccessToken, BusinessDetails, ClientConfig, CredentialsRole, InMemoryPartyRegistry, OcpiClient,
    OcpiError, OcpiResult, PartyStatus, RemoteAccessInfo, RemoteParty, Role, Transport,
    TransportRequest, TransportResponse,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_A: &str = "token-a";

pub fn own_role() -> CredentialsRole {
    CredentialsRole::new("DE", "EXA", Role::Emsp, BusinessDetails::named("Example Mobility"))
}

pub fn counterpart_role(name: &str) -> CredentialsRole {
    CredentialsRole::new("NL", "ABC", Role::Cpo, BusinessDetails::named(name))
}

pub fn config() -> ClientConfig {
    ClientConfig::default()
        .with_versions_url("https://emsp.example/ocpi/versions")
        .with_role(own_role())
        .with_max_retries(0)
}

pub fn remote_party(versions_url: &str, base64: bool) -> RemoteParty {
    RemoteParty {
        id: "NL-ABC".to_string(),
        roles: vec![counterpart_role("ABC Charging")],
        access_infos: vec![RemoteAccessInfo::new(
            versions_url.parse().expect("valid versions url"),
            AccessToken::new(TOKEN_A),
        )
        .with_base64_token(base64)],
        local_access_token: Some(AccessToken::new("local-token")),
        status: PartyStatus::Enabled,
    }
}

pub fn versions_url(server: &MockServer) -> String {
    format!("{}/ocpi/versions", server.uri())
}

pub fn create_client(
    server: &MockServer,
    config: ClientConfig,
) -> (OcpiClient, Arc<InMemoryPartyRegistry>) {
    let registry = Arc::new(InMemoryPartyRegistry::new());
    let client = OcpiClient::new(
        config,
        remote_party(&versions_url(server), false),
        registry.clone(),
    )
    .expect("failed to create client");
    (client, registry)
}

pub fn ok(data: Value) -> Value {
    json!({
        "data": data,
        "status_code": 1000,
        "status_message": "Success",
        "timestamp": "2024-05-01T12:00:00Z"
    })
}

pub fn versions_body(server: &MockServer, versions: &[&str]) -> Value {
    let list: Vec<Value> = versions
        .iter()
        .map(|v| json!({"version": v, "url": format!("{}/ocpi/{}", server.uri(), v)}))
        .collect();
    ok(Value::Array(list))
}

pub fn detail_body(server: &MockServer, version: &str) -> Value {
    ok(json!({
        "version": version,
        "endpoints": [
            {"identifier": "locations", "role": "SENDER", "url": format!("{}/ocpi/{}/locations", server.uri(), version)},
            {"identifier": "credentials", "role": "RECEIVER", "url": format!("{}/ocpi/{}/credentials", server.uri(), version)},
            {"identifier": "credentials", "role": "RECEIVER", "url": format!("{}/ocpi/{}/credentials-alt", server.uri(), version)}
        ]
    }))
}

/// Serve a version listing with one version and its detail.
pub async fn mount_discovery(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/ocpi/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body(server, &[version])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/ocpi/{}", version)))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(server, version)))
        .mount(server)
        .await;
}

pub fn credentials_path(version: &str) -> String {
    format!("/ocpi/{}/credentials", version)
}

pub fn credentials_body(token: &str, roles: &[CredentialsRole]) -> Value {
    ok(json!({
        "token": token,
        "url": "https://cpo.example/ocpi/versions",
        "roles": roles,
    }))
}

/// Transport answering from a script; records every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<OcpiResult<TransportResponse>>>,
    fallback: Mutex<Option<OcpiResult<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer used once the script is exhausted.
    pub fn always(self, response: OcpiResult<TransportResponse>) -> Self {
        *self.fallback.lock().unwrap() = Some(response);
        self
    }

    pub fn then(self, response: OcpiResult<TransportResponse>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> OcpiResult<TransportResponse> {
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| {
                Err(OcpiError::Transport {
                    message: "script exhausted".to_string(),
                })
            })
    }
}

pub fn response(status: u16, body: &Value) -> OcpiResult<TransportResponse> {
    Ok(TransportResponse {
        status,
        body: serde_json::to_vec(body).unwrap(),
    })
}

pub fn raw_response(status: u16, body: &str) -> OcpiResult<TransportResponse> {
    Ok(TransportResponse {
        status,
        body: body.as_bytes().to_vec(),
    })
}

pub fn connection_refused() -> OcpiResult<TransportResponse> {
    Err(OcpiError::Transport {
        message: "connection refused".to_string(),
    })
}

pub fn scripted_client(
    transport: Arc<ScriptedTransport>,
    config: ClientConfig,
) -> (OcpiClient, Arc<InMemoryPartyRegistry>) {
    let registry = Arc::new(InMemoryPartyRegistry::new());
    let client = OcpiClient::with_transport(
        config,
        remote_party("https://cpo.example/ocpi/versions", false),
        registry.clone(),
        transport,
    )
    .expect("failed to create client");
    (client, registry)
}
