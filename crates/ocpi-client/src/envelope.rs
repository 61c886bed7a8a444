//! Response envelope returned by every protocol operation.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::OcpiError;

/// Protocol status code meaning success.
pub const SUCCESS_STATUS_CODE: u32 = 1000;

/// Envelope as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEnvelope<T> {
    pub data: Option<T>,

    pub status_code: u32,

    #[serde(default)]
    pub status_message: Option<String>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// What happened at the transport level on the last attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// No network attempt was made.
    NotAttempted,

    /// The server answered with an HTTP status.
    Completed { http_status: u16 },

    /// The attempt failed before an HTTP status was received.
    Failed { message: String },

    /// Cancellation was observed at an attempt boundary.
    Cancelled,
}

impl TransportOutcome {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Completed { http_status } => Some(*http_status),
            _ => None,
        }
    }
}

/// Uniform result of a protocol operation.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope<T> {
    /// Protocol status code, if a response envelope was parsed.
    pub status_code: Option<u32>,

    pub status_message: Option<String>,

    /// Parsed payload.
    pub data: Option<T>,

    /// Server timestamp of the response.
    pub timestamp: Option<DateTime<Utc>>,

    /// Transport result of the last attempt.
    pub transport: TransportOutcome,

    /// `X-Request-ID` of the last attempt.
    pub request_id: Option<String>,

    /// `X-Correlation-ID` shared by all attempts.
    pub correlation_id: Option<String>,

    /// Number of network attempts made.
    pub attempts: u32,

    /// Why the call did not produce usable data.
    pub error: Option<OcpiError>,
}

impl<T> ResponseEnvelope<T> {
    /// Failure raised before any network attempt.
    ///
    /// A cancellation keeps its classification in `transport`.
    pub fn not_attempted(error: OcpiError) -> Self {
        let transport = match error {
            OcpiError::Cancelled => TransportOutcome::Cancelled,
            _ => TransportOutcome::NotAttempted,
        };
        Self {
            status_code: None,
            status_message: None,
            data: None,
            timestamp: None,
            transport,
            request_id: None,
            correlation_id: None,
            attempts: 0,
            error: Some(error),
        }
    }

    /// Protocol status 1000 and no failure.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code == Some(SUCCESS_STATUS_CODE)
    }

    pub fn http_status(&self) -> Option<u16> {
        self.transport.http_status()
    }

    /// Payload of a successful call.
    pub fn success_data(&self) -> Option<&T> {
        if self.is_success() {
            self.data.as_ref()
        } else {
            None
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Replace the payload, keeping all metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            status_code: self.status_code,
            status_message: self.status_message,
            data: self.data.map(f),
            timestamp: self.timestamp,
            transport: self.transport,
            request_id: self.request_id,
            correlation_id: self.correlation_id,
            attempts: self.attempts,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_envelope_without_data() {
        let wire: WireEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"status_code": 2001, "status_message": "Invalid or missing parameters", "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(wire.data.is_none());
        assert_eq!(wire.status_code, 2001);
        assert!(wire.timestamp.is_some());
    }

    #[test]
    fn test_not_attempted_is_failure() {
        let env: ResponseEnvelope<()> =
            ResponseEnvelope::not_attempted(OcpiError::configuration("no version"));
        assert!(!env.is_success());
        assert_eq!(env.attempts, 0);
        assert_eq!(env.transport, TransportOutcome::NotAttempted);
        assert!(env.error.as_ref().unwrap().is_configuration());
    }

    #[test]
    fn test_not_attempted_cancellation_is_classified() {
        let env: ResponseEnvelope<()> = ResponseEnvelope::not_attempted(OcpiError::Cancelled);
        assert_eq!(env.transport, TransportOutcome::Cancelled);
        assert_eq!(env.error, Some(OcpiError::Cancelled));
    }

    #[test]
    fn test_success_requires_status_1000() {
        let mut env: ResponseEnvelope<u8> = ResponseEnvelope::not_attempted(OcpiError::Cancelled);
        env.error = None;
        env.status_code = Some(1000);
        env.data = Some(7);
        assert_eq!(env.success_data(), Some(&7));

        env.status_code = Some(3000);
        assert!(env.success_data().is_none());
    }
}
