//! Domain value objects exchanged with a remote OCPI party.

use std::cmp::Ordering;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Length of generated access tokens.
const GENERATED_TOKEN_LEN: usize = 64;

/// Protocol version identifier (e.g., "2.2.1").
///
/// Ordered segment-wise: numeric segments compare as numbers, anything else
/// compares as text. Used to pick the best version a party offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.0.split('.');
        let mut right = other.0.split('.');

        loop {
            match (left.next(), right.next()) {
                (None, None) => break,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y),
                        _ => a.cmp(b),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }

        // "02" and "2" are numerically equal; keep Ord consistent with Eq.
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Entry of a version listing: where to fetch the detail of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInformation {
    /// Version identifier.
    pub version: VersionId,

    /// Discovery URL of the version detail.
    pub url: Url,
}

/// Functional module of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Cdrs,
    ChargingProfiles,
    Commands,
    Credentials,
    HubClientInfo,
    Locations,
    Sessions,
    Tariffs,
    Tokens,
    /// Module unknown to this client, kept verbatim.
    Other(String),
}

impl ModuleId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cdrs => "cdrs",
            Self::ChargingProfiles => "chargingprofiles",
            Self::Commands => "commands",
            Self::Credentials => "credentials",
            Self::HubClientInfo => "hubclientinfo",
            Self::Locations => "locations",
            Self::Sessions => "sessions",
            Self::Tariffs => "tariffs",
            Self::Tokens => "tokens",
            Self::Other(id) => id,
        }
    }

    pub fn parse(id: &str) -> Self {
        match id {
            "cdrs" => Self::Cdrs,
            "chargingprofiles" => Self::ChargingProfiles,
            "commands" => Self::Commands,
            "credentials" => Self::Credentials,
            "hubclientinfo" => Self::HubClientInfo,
            "locations" => Self::Locations,
            "sessions" => Self::Sessions,
            "tariffs" => Self::Tariffs,
            "tokens" => Self::Tokens,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(Self::parse(&id))
    }
}

/// Perspective of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterfaceRole {
    Sender,
    Receiver,
}

/// One functional capability exposed by a remote party for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Module identifier.
    pub identifier: ModuleId,

    /// Interface role.
    pub role: InterfaceRole,

    /// Endpoint URL.
    pub url: Url,
}

/// Endpoints of one protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetail {
    pub version: VersionId,

    /// Endpoints in the order the party listed them.
    pub endpoints: Vec<Endpoint>,
}

impl VersionDetail {
    /// First endpoint matching the module and role.
    pub fn endpoint(&self, module: &ModuleId, role: InterfaceRole) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| &e.identifier == module && e.role == role)
    }
}

/// Bearer secret. Never printed in clear.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Fresh random alphanumeric token.
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.as_bytes())
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self, base64_encode: bool) -> String {
        if base64_encode {
            format!("Token {}", self.to_base64())
        } else {
            format!("Token {}", self.0)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", redact(&self.0))
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Business role of a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Cpo,
    Emsp,
    Hub,
    Nap,
    Nsp,
    Other,
    Scsp,
}

/// Category of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageCategory {
    Charger,
    Entrance,
    Location,
    Network,
    Operator,
    Other,
    Owner,
}

/// Image reference (logo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: Url,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Url>,

    pub category: ImageCategory,

    /// Image type, e.g. "png".
    #[serde(rename = "type")]
    pub image_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Business details of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDetails {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Image>,
}

impl BusinessDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: None,
            logo: None,
        }
    }
}

/// One declared business role of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsRole {
    pub role: Role,

    pub party_id: String,

    pub country_code: String,

    pub business_details: BusinessDetails,
}

impl CredentialsRole {
    pub fn new(
        country_code: impl Into<String>,
        party_id: impl Into<String>,
        role: Role,
        business_details: BusinessDetails,
    ) -> Self {
        Self {
            role,
            party_id: party_id.into(),
            country_code: country_code.into(),
            business_details,
        }
    }

    /// Same (country code, party id, role); business details are ignored.
    pub fn same_identity(&self, other: &CredentialsRole) -> bool {
        self.country_code == other.country_code
            && self.party_id == other.party_id
            && self.role == other.role
    }
}

impl fmt::Display for CredentialsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}:{:?}", self.country_code, self.party_id, self.role)
    }
}

/// Credentials document exchanged during registration and updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Token the receiver must use to call the sender.
    pub token: AccessToken,

    /// Versions URL of the sender.
    pub url: Url,

    /// Roles the sender declares.
    pub roles: Vec<CredentialsRole>,
}
