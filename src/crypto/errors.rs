//! # Crypto Errors
//!
//! Error types for identities, certificates and signatures.

use thiserror::Error;

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Identity, certificate and signature errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    // ==================
    // Credential Files
    // ==================

    /// Credential file could not be read or written
    #[error("failed to access {path}: {reason}")]
    FileAccess { path: String, reason: String },

    /// File is not a PEM block with the expected label
    #[error("malformed PEM in {path}: expected {label} block")]
    MalformedPem { path: String, label: &'static str },

    // ==================
    // Key Material
    // ==================

    /// Certificate bytes do not decode
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Private key bytes do not decode
    #[error("malformed private key: {0}")]
    MalformedKey(String),

    /// Private key does not belong to the certificate
    #[error("private key does not match certificate of {0}")]
    KeyMismatch(String),

    /// Certificate was not issued by any trusted root
    #[error("certificate is not issued by a trusted CA root")]
    UntrustedCertificate,

    // ==================
    // Signatures
    // ==================

    /// Signature does not verify
    #[error("signature verification failed")]
    InvalidSignature,

    /// Payload could not be canonicalised for signing
    #[error("failed to serialize payload: {0}")]
    Serialization(String),
}

impl CryptoError {
    pub(crate) fn file_access(path: &std::path::Path, err: std::io::Error) -> Self {
        CryptoError::FileAccess {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
