//! # Transport Errors
//!
//! Failures surfaced by an envelope transport. Network-level errors are
//! carried verbatim; no retry happens at this layer.

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Envelope was not signed
    #[error("envelope validation failed: empty signature")]
    EmptySignature,

    /// Base URL is empty or unusable
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection-level failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Server refused the request
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Requested entity does not exist (yet)
    #[error("not found: {0}")]
    NotFound(String),

    /// Request conflicts with existing state, e.g. a reused transaction ID
    #[error("conflict: {0}")]
    Conflict(String),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Build the error for a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => TransportError::NotFound(message),
            409 => TransportError::Conflict(message),
            _ => TransportError::Rejected { status, message },
        }
    }

    /// HTTP status equivalent, used when relaying errors over REST
    pub fn status_code(&self) -> u16 {
        match self {
            TransportError::EmptySignature => 400,
            TransportError::InvalidUrl { .. } => 400,
            TransportError::Decode(_) => 400,
            TransportError::Rejected { status, .. } => *status,
            TransportError::NotFound(_) => 404,
            TransportError::Conflict(_) => 409,
            TransportError::Timeout => 504,
            TransportError::Http(_) => 502,
        }
    }

    /// True when the server did not recognise the signer
    pub fn is_unrecognised_signer(&self) -> bool {
        matches!(
            self,
            TransportError::Rejected {
                status: 401 | 403,
                ..
            }
        )
    }

    pub(crate) fn unauthorised(message: impl Into<String>) -> Self {
        TransportError::Rejected {
            status: 401,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        TransportError::Rejected {
            status: 400,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}
