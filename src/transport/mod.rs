//! # Envelope Transport
//!
//! Carries signed query and transaction envelopes to the server.
//!
//! ## Invariants
//! - Every operation rejects an unsigned envelope before doing anything else
//! - Errors are surfaced verbatim, never retried

pub mod errors;
pub mod memory;
pub mod rest;

use async_trait::async_trait;

use crate::types::{
    ConfigTxEnvelope, Envelope, GetConfigQueryEnvelope, GetConfigResponseEnvelope,
    GetNodeConfigQueryEnvelope, GetNodeConfigResponseEnvelope, GetStateQueryEnvelope,
    GetStateResponseEnvelope, GetStatusQueryEnvelope, GetStatusResponseEnvelope,
    GetTxReceiptQueryEnvelope, GetTxReceiptResponseEnvelope, TransactionEnvelope,
};

pub use errors::{TransportError, TransportResult};
pub use memory::InMemoryLedger;
pub use rest::RestClient;

/// Transport for signed envelopes
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    /// Read a key from a database
    async fn get_state(
        &self,
        envelope: &GetStateQueryEnvelope,
    ) -> TransportResult<GetStateResponseEnvelope>;

    /// Check whether a database exists
    async fn get_status(
        &self,
        envelope: &GetStatusQueryEnvelope,
    ) -> TransportResult<GetStatusResponseEnvelope>;

    /// Read the committed cluster configuration and its version
    async fn get_config(
        &self,
        envelope: &GetConfigQueryEnvelope,
    ) -> TransportResult<GetConfigResponseEnvelope>;

    /// Ask the responding node for its own configuration
    async fn get_node_config(
        &self,
        envelope: &GetNodeConfigQueryEnvelope,
    ) -> TransportResult<GetNodeConfigResponseEnvelope>;

    /// Fetch the receipt of a decided transaction
    async fn get_tx_receipt(
        &self,
        envelope: &GetTxReceiptQueryEnvelope,
    ) -> TransportResult<GetTxReceiptResponseEnvelope>;

    /// Submit a data transaction
    async fn submit_transaction(&self, envelope: &TransactionEnvelope) -> TransportResult<()>;

    /// Submit a configuration transaction
    async fn submit_config_transaction(&self, envelope: &ConfigTxEnvelope) -> TransportResult<()>;
}

/// Reject envelopes that carry no signature
pub fn ensure_signed<P>(envelope: &Envelope<P>) -> TransportResult<()> {
    if envelope.is_signed() {
        Ok(())
    } else {
        Err(TransportError::EmptySignature)
    }
}
