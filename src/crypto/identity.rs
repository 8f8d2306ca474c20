//! # Signing Identity
//!
//! A user's certificate together with the private key that signs on its
//! behalf. Loaded from PEM files named in the session configuration.

use std::fmt;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use serde::Serialize;

use super::certificate::Certificate;
use super::errors::{CryptoError, CryptoResult};
use super::pem::{read_pem, CERTIFICATE_LABEL, PRIVATE_KEY_LABEL};
use super::{canonical_bytes, constant_time_eq};
use crate::types::Envelope;

/// Certificate plus private key of one user
#[derive(Clone)]
pub struct SigningIdentity {
    user_id: String,
    certificate: Vec<u8>,
    signing_key: SigningKey,
}

impl SigningIdentity {
    /// Bind a key to a certificate, rejecting a key the certificate does not certify
    pub fn new(
        user_id: impl Into<String>,
        certificate: Vec<u8>,
        signing_key: SigningKey,
    ) -> CryptoResult<Self> {
        let user_id = user_id.into();
        let cert = Certificate::from_bytes(&certificate)?;

        if !constant_time_eq(
            cert.public_key().as_bytes(),
            signing_key.verifying_key().as_bytes(),
        ) {
            return Err(CryptoError::KeyMismatch(user_id));
        }

        Ok(Self {
            user_id,
            certificate,
            signing_key,
        })
    }

    /// Load an identity from a certificate file and a private key file
    pub fn load(user_id: &str, cert_path: &Path, key_path: &Path) -> CryptoResult<Self> {
        let certificate = read_pem(cert_path, CERTIFICATE_LABEL)?;
        let key = read_pem(key_path, PRIVATE_KEY_LABEL)?;
        let seed: [u8; 32] = key.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedKey(format!("expected 32 bytes, got {}", key.len()))
        })?;

        Self::new(user_id, certificate, SigningKey::from_bytes(&seed))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Raw certificate bytes, as registered in the cluster configuration
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Sign the canonical encoding of a payload
    pub fn sign<T: Serialize>(&self, payload: &T) -> CryptoResult<Vec<u8>> {
        let bytes = canonical_bytes(payload)?;
        Ok(self.signing_key.sign(&bytes).to_bytes().to_vec())
    }

    /// Wrap a payload in an envelope carrying this identity's signature
    pub fn sign_envelope<T: Serialize>(&self, payload: T) -> CryptoResult<Envelope<T>> {
        let signature = self.sign(&payload)?;
        Ok(Envelope::new(payload, signature))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("user_id", &self.user_id)
            .field("certificate_len", &self.certificate.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::pem::write_pem;
    use crate::crypto::{generate_signing_key, verify_signature};

    fn issue(ca: &SigningKey, key: &SigningKey) -> Vec<u8> {
        Certificate::issue(ca, &key.verifying_key()).to_bytes()
    }

    #[test]
    fn test_sign_and_verify() {
        let ca = generate_signing_key();
        let key = generate_signing_key();
        let identity = SigningIdentity::new("alice", issue(&ca, &key), key).unwrap();

        let payload = ("alice", 42u32);
        let sig = identity.sign(&payload).unwrap();
        assert!(verify_signature(identity.certificate(), &payload, &sig).is_ok());
        assert!(verify_signature(identity.certificate(), &("bob", 42u32), &sig).is_err());
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let ca = generate_signing_key();
        let key = generate_signing_key();
        let other = generate_signing_key();

        let result = SigningIdentity::new("alice", issue(&ca, &key), other);
        assert_eq!(result.err(), Some(CryptoError::KeyMismatch("alice".to_string())));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let ca = generate_signing_key();
        let key = generate_signing_key();
        let cert_path = dir.path().join("alice.pem");
        let key_path = dir.path().join("alice.key");

        write_pem(&cert_path, CERTIFICATE_LABEL, &issue(&ca, &key)).unwrap();
        write_pem(&key_path, PRIVATE_KEY_LABEL, &key.to_bytes()).unwrap();

        let identity = SigningIdentity::load("alice", &cert_path, &key_path).unwrap();
        assert_eq!(identity.user_id(), "alice");
        assert_eq!(identity.certificate(), issue(&ca, &key).as_slice());
    }

    #[test]
    fn test_load_rejects_short_key() {
        let dir = tempfile::tempdir().unwrap();
        let ca = generate_signing_key();
        let key = generate_signing_key();
        let cert_path = dir.path().join("alice.pem");
        let key_path = dir.path().join("alice.key");

        write_pem(&cert_path, CERTIFICATE_LABEL, &issue(&ca, &key)).unwrap();
        write_pem(&key_path, PRIVATE_KEY_LABEL, &[1, 2, 3]).unwrap();

        let result = SigningIdentity::load("alice", &cert_path, &key_path);
        assert!(matches!(result, Err(CryptoError::MalformedKey(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let ca = generate_signing_key();
        let key = generate_signing_key();
        let identity = SigningIdentity::new("alice", issue(&ca, &key), key).unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("signing_key"));
    }
}
