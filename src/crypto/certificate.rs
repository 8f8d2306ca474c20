//! # Certificates
//!
//! A certificate binds an ed25519 verifying key to the CA that issued it.
//!
//! Encoding: 32-byte subject verifying key followed by the 64-byte CA
//! signature over those 32 bytes. A CA root is the CA's 32-byte verifying key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use super::errors::{CryptoError, CryptoResult};

const KEY_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

/// Length of an encoded certificate
pub const CERTIFICATE_LEN: usize = KEY_LEN + SIGNATURE_LEN;

/// A CA-issued public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    public_key: VerifyingKey,
    issuer_signature: Signature,
}

impl Certificate {
    /// Issue a certificate for `subject`, signed by the CA key
    pub fn issue(ca: &SigningKey, subject: &VerifyingKey) -> Self {
        Self {
            public_key: *subject,
            issuer_signature: ca.sign(subject.as_bytes()),
        }
    }

    /// Decode a certificate from its wire encoding
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != CERTIFICATE_LEN {
            return Err(CryptoError::MalformedCertificate(format!(
                "expected {} bytes, got {}",
                CERTIFICATE_LEN,
                bytes.len()
            )));
        }

        let (key, sig) = bytes.split_at(KEY_LEN);
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| CryptoError::MalformedCertificate("bad key length".to_string()))?;
        let public_key = VerifyingKey::from_bytes(&key)
            .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;
        let issuer_signature = Signature::from_slice(sig)
            .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;

        Ok(Self {
            public_key,
            issuer_signature,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CERTIFICATE_LEN);
        out.extend_from_slice(self.public_key.as_bytes());
        out.extend_from_slice(&self.issuer_signature.to_bytes());
        out
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// Check that the certificate was issued by the given CA root
    pub fn verify_issued_by(&self, root: &[u8]) -> CryptoResult<()> {
        let root: [u8; KEY_LEN] = root
            .try_into()
            .map_err(|_| CryptoError::UntrustedCertificate)?;
        let ca = VerifyingKey::from_bytes(&root).map_err(|_| CryptoError::UntrustedCertificate)?;

        ca.verify(self.public_key.as_bytes(), &self.issuer_signature)
            .map_err(|_| CryptoError::UntrustedCertificate)
    }

    /// Check that any of the roots issued the certificate
    pub fn verify_against_roots(&self, roots: &[Vec<u8>]) -> CryptoResult<()> {
        if roots.iter().any(|root| self.verify_issued_by(root).is_ok()) {
            Ok(())
        } else {
            Err(CryptoError::UntrustedCertificate)
        }
    }

    /// Verify a signature made by the certificate holder
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let signature =
            Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
        self.public_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

/// Encode the CA root for a CA key
pub fn ca_root(ca: &SigningKey) -> Vec<u8> {
    ca.verifying_key().to_bytes().to_vec()
}
