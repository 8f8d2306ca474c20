//! # Envelope Wire Types
//!
//! Signed request and response envelopes exchanged with the server.
//! The signature always covers the canonical JSON encoding of `payload`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::cluster::{ClusterConfig, NodeConfig, Version};

/// A payload together with the signature over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub payload: P,
    pub signature: Vec<u8>,
}

impl<P> Envelope<P> {
    pub fn new(payload: P, signature: Vec<u8>) -> Self {
        Self { payload, signature }
    }

    /// Envelope with no signature attached yet
    pub fn unsigned(payload: P) -> Self {
        Self {
            payload,
            signature: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

// ==================
// Queries
// ==================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStateQuery {
    pub user_id: String,
    pub db_name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStatusQuery {
    pub user_id: String,
    pub db_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigQuery {
    pub user_id: String,
}

/// Asks the responding node to identify itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNodeConfigQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTxReceiptQuery {
    pub user_id: String,
    pub tx_id: String,
}

pub type GetStateQueryEnvelope = Envelope<GetStateQuery>;
pub type GetStatusQueryEnvelope = Envelope<GetStatusQuery>;
pub type GetConfigQueryEnvelope = Envelope<GetConfigQuery>;
pub type GetNodeConfigQueryEnvelope = Envelope<GetNodeConfigQuery>;
pub type GetTxReceiptQueryEnvelope = Envelope<GetTxReceiptQuery>;

// ==================
// Transactions
// ==================

/// Data model a transaction operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataModel {
    Kv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRead {
    pub key: String,
    /// Version the value was read at; `None` when the key was absent
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
    #[serde(default)]
    pub is_delete: bool,
}

/// A data transaction against one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub db_name: String,
    pub tx_id: String,
    pub data_model: DataModel,
    pub reads: Vec<KvRead>,
    pub writes: Vec<KvWrite>,
}

/// A proposal to replace the cluster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTransaction {
    pub user_id: String,
    pub tx_id: String,
    /// Version of the configuration the proposal was derived from
    pub read_old_config_version: Option<Version>,
    pub new_config: ClusterConfig,
}

pub type TransactionEnvelope = Envelope<Transaction>;
pub type ConfigTxEnvelope = Envelope<ConfigTransaction>;

// ==================
// Responses
// ==================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStateResponse {
    pub value: Vec<u8>,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStatusResponse {
    pub db_name: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigResponse {
    pub config: ClusterConfig,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNodeConfigResponse {
    pub node: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTxReceiptResponse {
    pub receipt: TxReceipt,
}

pub type GetStateResponseEnvelope = Envelope<GetStateResponse>;
pub type GetStatusResponseEnvelope = Envelope<GetStatusResponse>;
pub type GetConfigResponseEnvelope = Envelope<GetConfigResponse>;
pub type GetNodeConfigResponseEnvelope = Envelope<GetNodeConfigResponse>;
pub type GetTxReceiptResponseEnvelope = Envelope<GetTxReceiptResponse>;

// ==================
// Receipts
// ==================

/// Outcome the server assigned to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationFlag {
    Valid,
    InvalidMvccConflict,
    InvalidIncorrectEntries,
    InvalidUnauthorised,
}

impl ValidationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFlag::Valid => "VALID",
            ValidationFlag::InvalidMvccConflict => "INVALID_MVCC_CONFLICT",
            ValidationFlag::InvalidIncorrectEntries => "INVALID_INCORRECT_ENTRIES",
            ValidationFlag::InvalidUnauthorised => "INVALID_UNAUTHORISED",
        }
    }
}

impl fmt::Display for ValidationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationInfo {
    pub flag: ValidationFlag,
    #[serde(default)]
    pub reason: String,
}

impl ValidationInfo {
    pub fn valid() -> Self {
        Self {
            flag: ValidationFlag::Valid,
            reason: String::new(),
        }
    }

    pub fn invalid(flag: ValidationFlag, reason: impl Into<String>) -> Self {
        Self {
            flag,
            reason: reason.into(),
        }
    }
}

/// Proof that a transaction was included in a block and decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: String,
    pub block_num: u64,
    pub tx_index: u64,
    pub validation: ValidationInfo,
}

impl TxReceipt {
    pub fn is_valid(&self) -> bool {
        self.validation.flag == ValidationFlag::Valid
    }
}
