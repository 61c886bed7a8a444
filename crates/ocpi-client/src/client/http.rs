//! HTTP layer: header construction, retried execution, envelope mapping.
//!
//! This is the only place that interprets HTTP and protocol status codes.
//! The operation modules never look at them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::codec::Codec;
use crate::envelope::{ResponseEnvelope, TransportOutcome, WireEnvelope, SUCCESS_STATUS_CODE};
use crate::error::{OcpiError, OcpiResult};
use crate::observe::{ObserverList, Operation, RequestEvent, ResponseEvent};
use crate::retry::{Attempt, RetryOutcome, RetryPolicy};
use crate::transport::{Transport, TransportRequest};
use crate::types::AccessToken;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Longest error body excerpt kept in a transport error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Outbound bearer: raw token and its header form, always replaced together.
#[derive(Debug, Clone)]
pub(crate) struct Bearer {
    token: AccessToken,
    header: HeaderValue,
    base64_encode: bool,
}

impl Bearer {
    pub(crate) fn new(token: AccessToken, base64_encode: bool) -> OcpiResult<Self> {
        let mut header = HeaderValue::from_str(&token.header_value(base64_encode)).map_err(|_| {
            OcpiError::configuration("access token cannot be carried in an Authorization header")
        })?;
        header.set_sensitive(true);
        Ok(Self {
            token,
            header,
            base64_encode,
        })
    }

    /// Same encoding, new token.
    pub(crate) fn rotate(&self, token: AccessToken) -> OcpiResult<Self> {
        Self::new(token, self.base64_encode)
    }

    pub(crate) fn token(&self) -> &AccessToken {
        &self.token
    }

    pub(crate) fn header(&self) -> &HeaderValue {
        &self.header
    }
}

/// One logical request.
#[derive(Debug)]
pub(crate) struct Call {
    pub operation: Operation,
    pub method: Method,
    pub url: Url,
    pub body: Option<Vec<u8>>,
}

impl Call {
    pub(crate) fn get(operation: Operation, url: Url) -> Self {
        Self {
            operation,
            method: Method::GET,
            url,
            body: None,
        }
    }

    pub(crate) fn delete(operation: Operation, url: Url) -> Self {
        Self {
            operation,
            method: Method::DELETE,
            url,
            body: None,
        }
    }

    pub(crate) fn with_body(operation: Operation, method: Method, url: Url, body: Vec<u8>) -> Self {
        Self {
            operation,
            method,
            url,
            body: Some(body),
        }
    }
}

/// Transport, codec, retry policy and observers shared by all operations.
#[derive(Clone)]
pub(crate) struct HttpBackend {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: HeaderValue,
    pub(crate) observers: ObserverList,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("transport", &self.transport)
            .field("codec", &self.codec)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpBackend {
    /// Run `call` through the retry policy and map the last attempt to an envelope.
    pub(crate) async fn execute<T>(
        &self,
        call: Call,
        bearer: &Bearer,
        cancel: &CancellationToken,
        parse: impl Fn(&dyn Codec, &[u8]) -> OcpiResult<WireEnvelope<T>>,
    ) -> ResponseEnvelope<T> {
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        debug!(
            operation = %call.operation,
            method = %call.method,
            url = %call.url,
            correlation_id = %correlation_id,
            "sending request"
        );

        let outcome = self
            .retry
            .run(cancel, |attempt| {
                let request_id = Uuid::new_v4().to_string();
                let request = self.build_request(&call, bearer, &request_id, &correlation_id);
                self.observers.request(&RequestEvent {
                    operation: call.operation,
                    method: call.method.to_string(),
                    url: call.url.clone(),
                    request_id: request_id.clone(),
                    correlation_id: correlation_id.clone(),
                    attempt,
                    sent_at: Utc::now(),
                });
                let transport = Arc::clone(&self.transport);
                async move {
                    let result = match request {
                        Ok(request) => transport.send(request).await,
                        Err(e) => Err(e),
                    };
                    Attempt {
                        request_id: Some(request_id),
                        result,
                    }
                }
            })
            .await;

        let envelope = into_envelope(outcome, correlation_id, |body| {
            parse(self.codec.as_ref(), body)
        });

        self.observers.response(&ResponseEvent {
            operation: call.operation,
            request_id: envelope.request_id.clone(),
            correlation_id: envelope.correlation_id.clone().unwrap_or_default(),
            http_status: envelope.http_status(),
            status_code: envelope.status_code,
            success: envelope.is_success(),
            cancelled: envelope.transport == TransportOutcome::Cancelled,
            attempts: envelope.attempts,
            elapsed: started.elapsed(),
        });

        debug!(
            operation = %call.operation,
            http_status = ?envelope.http_status(),
            status_code = ?envelope.status_code,
            attempts = envelope.attempts,
            success = envelope.is_success(),
            "request finished"
        );

        envelope
    }

    fn build_request(
        &self,
        call: &Call,
        bearer: &Bearer,
        request_id: &str,
        correlation_id: &str,
    ) -> OcpiResult<TransportRequest> {
        let content_type = HeaderValue::from_static(self.codec.content_type());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer.header().clone());
        headers.insert(ACCEPT, content_type.clone());
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(REQUEST_ID, header_value(request_id)?);
        headers.insert(CORRELATION_ID, header_value(correlation_id)?);
        if call.body.is_some() {
            headers.insert(CONTENT_TYPE, content_type);
        }

        Ok(TransportRequest {
            method: call.method.clone(),
            url: call.url.clone(),
            headers,
            body: call.body.clone(),
            timeout: self.timeout,
        })
    }
}

fn header_value(value: &str) -> OcpiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| OcpiError::Transport {
        message: format!("invalid header value: {}", e),
    })
}

/// Map the terminal attempt to an envelope.
///
/// Success needs a 2xx status and a parsed envelope with status 1000. A
/// parsed non-1000 status is a protocol error whatever the HTTP status.
fn into_envelope<T>(
    outcome: RetryOutcome,
    correlation_id: String,
    parse: impl FnOnce(&[u8]) -> OcpiResult<WireEnvelope<T>>,
) -> ResponseEnvelope<T> {
    let mut envelope = ResponseEnvelope {
        status_code: None,
        status_message: None,
        data: None,
        timestamp: None,
        transport: outcome.transport.clone(),
        request_id: outcome.request_id,
        correlation_id: Some(correlation_id),
        attempts: outcome.attempts,
        error: None,
    };

    let http_status = match outcome.transport {
        TransportOutcome::Completed { http_status } => http_status,
        TransportOutcome::Cancelled => {
            envelope.error = Some(OcpiError::Cancelled);
            return envelope;
        }
        TransportOutcome::Failed { message } => {
            envelope.error = Some(OcpiError::Transport { message });
            return envelope;
        }
        TransportOutcome::NotAttempted => {
            envelope.error = Some(OcpiError::Transport {
                message: "no attempt was made".to_string(),
            });
            return envelope;
        }
    };

    let http_ok = (200..300).contains(&http_status);
    let body = outcome.body.unwrap_or_default();

    match parse(&body) {
        Ok(wire) => {
            envelope.status_code = Some(wire.status_code);
            envelope.status_message = wire.status_message.clone();
            envelope.timestamp = wire.timestamp;
            envelope.data = wire.data;

            if wire.status_code != SUCCESS_STATUS_CODE {
                envelope.error = Some(OcpiError::Protocol {
                    status_code: wire.status_code,
                    message: wire
                        .status_message
                        .unwrap_or_else(|| format!("HTTP {}", http_status)),
                });
            } else if !http_ok {
                envelope.error = Some(OcpiError::Transport {
                    message: format!("HTTP {}", http_status),
                });
            }
        }
        Err(e) if http_ok => envelope.error = Some(e),
        Err(_) => {
            let excerpt: String = String::from_utf8_lossy(&body)
                .chars()
                .take(BODY_EXCERPT_CHARS)
                .collect();
            envelope.error = Some(OcpiError::Transport {
                message: format!("HTTP {}: {}", http_status, excerpt),
            });
        }
    }

    envelope
}
