//! # Cryptographic Utilities
//!
//! Signing identities, certificates and transaction identifiers.
//!
//! ## Invariants
//! - Signatures always cover the canonical JSON encoding of a payload
//! - Certificate comparisons are constant-time

pub mod certificate;
pub mod errors;
pub mod identity;
pub mod pem;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub use certificate::{ca_root, Certificate};
pub use errors::{CryptoError, CryptoResult};
pub use identity::SigningIdentity;

const TX_NONCE_LEN: usize = 24;

/// Canonical bytes of a payload, as covered by signatures
pub fn canonical_bytes<T: Serialize>(payload: &T) -> CryptoResult<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| CryptoError::Serialization(e.to_string()))
}

/// Verify that the holder of `certificate` signed `payload`
pub fn verify_signature<T: Serialize>(
    certificate: &[u8],
    payload: &T,
    signature: &[u8],
) -> CryptoResult<()> {
    let cert = Certificate::from_bytes(certificate)?;
    cert.verify(&canonical_bytes(payload)?, signature)
}

/// Generate a fresh ed25519 key from the OS RNG
pub fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

/// Derive a unique transaction ID for a submitter.
///
/// SHA-256 over a random nonce and the submitter's certificate, base64url encoded.
pub fn compute_tx_id(certificate: &[u8]) -> String {
    let mut nonce = [0u8; TX_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(certificate);
    let digest = hasher.finalize();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, digest)
}

/// Constant-time comparison of two byte slices
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
