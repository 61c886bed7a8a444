//! Wire encoding of domain values.

use std::fmt;

use serde::de::{DeserializeOwned, IgnoredAny};

use crate::envelope::WireEnvelope;
use crate::error::{OcpiError, OcpiResult};
use crate::types::{Credentials, VersionDetail, VersionInformation};

/// Encodes and decodes protocol documents.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Media type sent in `Accept` and `Content-Type`.
    fn content_type(&self) -> &'static str;

    fn parse_version_information_list(
        &self,
        body: &[u8],
    ) -> OcpiResult<WireEnvelope<Vec<VersionInformation>>>;

    fn parse_version_detail(&self, body: &[u8]) -> OcpiResult<WireEnvelope<VersionDetail>>;

    fn parse_credentials(&self, body: &[u8]) -> OcpiResult<WireEnvelope<Credentials>>;

    /// Envelope whose payload is ignored.
    fn parse_status(&self, body: &[u8]) -> OcpiResult<WireEnvelope<()>>;

    fn credentials_to_bytes(&self, credentials: &Credentials) -> OcpiResult<Vec<u8>>;
}

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn parse<T: DeserializeOwned>(&self, body: &[u8], what: &str) -> OcpiResult<WireEnvelope<T>> {
        serde_json::from_slice(body).map_err(|e| OcpiError::Decode {
            message: format!("failed to parse {}: {}", what, e),
        })
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn parse_version_information_list(
        &self,
        body: &[u8],
    ) -> OcpiResult<WireEnvelope<Vec<VersionInformation>>> {
        self.parse(body, "version list")
    }

    fn parse_version_detail(&self, body: &[u8]) -> OcpiResult<WireEnvelope<VersionDetail>> {
        self.parse(body, "version detail")
    }

    fn parse_credentials(&self, body: &[u8]) -> OcpiResult<WireEnvelope<Credentials>> {
        self.parse(body, "credentials")
    }

    fn parse_status(&self, body: &[u8]) -> OcpiResult<WireEnvelope<()>> {
        let wire: WireEnvelope<IgnoredAny> = self.parse(body, "status envelope")?;
        Ok(WireEnvelope {
            data: wire.data.map(|_| ()),
            status_code: wire.status_code,
            status_message: wire.status_message,
            timestamp: wire.timestamp,
        })
    }

    fn credentials_to_bytes(&self, credentials: &Credentials) -> OcpiResult<Vec<u8>> {
        Ok(serde_json::to_vec(credentials)?)
    }
}
