//! # Session
//!
//! A user's signing identity bound to a transport. Sessions open
//! configuration transactions.
//!
//! ## Invariants
//! - Opening a transaction re-checks that the server still recognises the
//!   signer, so a rotated or removed certificate stops working immediately
//! - Sibling transactions share no mutable state

use std::fmt;
use std::sync::Arc;

use super::config_tx::{fetch_receipt, transport_failed, ConfigTxContext};
use super::errors::{ClientError, ClientResult};
use crate::config::TxOptions;
use crate::crypto::{verify_signature, Certificate, SigningIdentity};
use crate::observability::{log_event_with_fields, Event};
use crate::transport::EnvelopeTransport;
use crate::types::{GetNodeConfigQuery, TxReceipt};

/// Authenticated handle for one user
#[derive(Clone)]
pub struct Session {
    identity: Arc<SigningIdentity>,
    transport: Arc<dyn EnvelopeTransport>,
    trusted_roots: Arc<Vec<Vec<u8>>>,
    tx_options: TxOptions,
}

impl Session {
    pub(crate) fn new(
        identity: SigningIdentity,
        transport: Arc<dyn EnvelopeTransport>,
        trusted_roots: Arc<Vec<Vec<u8>>>,
        tx_options: TxOptions,
    ) -> Self {
        log_event_with_fields(Event::SessionOpened, &[("user_id", identity.user_id())]);
        Self {
            identity: Arc::new(identity),
            transport,
            trusted_roots,
            tx_options,
        }
    }

    pub fn user_id(&self) -> &str {
        self.identity.user_id()
    }

    pub fn tx_options(&self) -> &TxOptions {
        &self.tx_options
    }

    /// Open a new configuration transaction.
    ///
    /// Fails with `ServerCertificateUnavailable` when the server no longer
    /// recognises this session's certificate.
    pub async fn config_tx(&self) -> ClientResult<ConfigTxContext> {
        let server_certificate = self.server_certificate().await?;
        Ok(ConfigTxContext::new(
            Arc::clone(&self.identity),
            Arc::clone(&self.transport),
            server_certificate,
            self.tx_options.clone(),
        ))
    }

    /// Receipt of a submitted transaction, or `None` while it is undecided
    pub async fn tx_receipt(&self, tx_id: &str) -> ClientResult<Option<TxReceipt>> {
        let server_certificate = self.server_certificate().await?;
        fetch_receipt(
            &self.identity,
            self.transport.as_ref(),
            &server_certificate,
            tx_id,
        )
        .await
    }

    /// Ask the server to identify itself, authenticating as this session
    async fn server_certificate(&self) -> ClientResult<Vec<u8>> {
        let query = self.identity.sign_envelope(GetNodeConfigQuery {
            user_id: self.identity.user_id().to_string(),
        })?;

        let response = match self.transport.get_node_config(&query).await {
            Ok(response) => response,
            Err(e) if e.is_unrecognised_signer() => {
                let reason = e.to_string();
                return Err(self.certificate_unavailable(&reason));
            }
            Err(e) => return Err(transport_failed("get_node_config", e)),
        };

        let node = response.payload.node.clone();
        if verify_signature(&node.certificate, &response.payload, &response.signature).is_err() {
            return Err(self.certificate_unavailable("node response signature does not verify"));
        }

        if !self.trusted_roots.is_empty() {
            let trusted = Certificate::from_bytes(&node.certificate)
                .and_then(|cert| cert.verify_against_roots(&self.trusted_roots));
            if trusted.is_err() {
                return Err(self.certificate_unavailable("node certificate is not trusted"));
            }
        }

        Ok(node.certificate)
    }

    fn certificate_unavailable(&self, reason: &str) -> ClientError {
        log_event_with_fields(
            Event::ServerCertUnavailable,
            &[("reason", reason), ("user_id", self.identity.user_id())],
        );
        ClientError::ServerCertificateUnavailable
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.identity.user_id())
            .field("tx_options", &self.tx_options)
            .finish_non_exhaustive()
    }
}
