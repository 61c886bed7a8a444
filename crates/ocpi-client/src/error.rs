//! Error types for the OCPI client.

/// OCPI client errors.
///
/// Protocol operations never return these directly; they are carried inside
/// a [`ResponseEnvelope`](crate::envelope::ResponseEnvelope). Only
/// `Precondition` escapes as an `Err`, from client construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OcpiError {
    /// No version selected or no endpoint resolved before any network attempt.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection failure or exception during a network attempt.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Response parsed but its status code is not the success code.
    #[error("protocol error {status_code}: {message}")]
    Protocol { status_code: u32, message: String },

    /// Response body could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// The operation was cancelled at an attempt boundary.
    #[error("operation cancelled")]
    Cancelled,

    /// Returned roles do not match the previously known roles.
    #[error("role validation failed: {message}")]
    Validation { message: String },

    /// API misuse (missing required arguments or state).
    #[error("precondition violated: {message}")]
    Precondition { message: String },

    /// The party registry rejected a write.
    #[error("registry error: {message}")]
    Registry { message: String },
}

impl OcpiError {
    /// Whether the error may go away on retransmission.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the error was raised before any network attempt.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for OcpiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OcpiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// Result type for OCPI client operations.
pub type OcpiResult<T> = Result<T, OcpiError>;
