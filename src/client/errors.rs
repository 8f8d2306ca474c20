//! # Client Errors
//!
//! Error taxonomy for sessions and configuration transactions.

use std::fmt;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::transport::TransportError;
use crate::types::ValidationFlag;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Kind of cluster member a staged mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Admin,
    Node,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Admin => write!(f, "admin"),
            Entity::Node => write!(f, "node"),
        }
    }
}

/// Which view of the configuration a check ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Snapshot read from the server
    Current,
    /// Working copy with this transaction's mutations applied
    Pending,
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Current => write!(f, "current"),
            ConfigScope::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    // ==================
    // Transaction Lifecycle
    // ==================

    /// Context was already committed or aborted
    #[error("transaction has already been spent")]
    TxSpent,

    /// Receipt reports the transaction was not applied
    #[error("transaction {tx_id} was invalidated ({flag}): {reason}")]
    TxInvalidated {
        tx_id: String,
        flag: ValidationFlag,
        reason: String,
    },

    /// No receipt arrived within the commit timeout
    #[error("timed out waiting for the receipt of transaction {tx_id}")]
    CommitTimeout { tx_id: String },

    // ==================
    // Staged Mutations
    // ==================

    #[error("{entity} already exists in {scope} config: {id}")]
    AlreadyExists {
        entity: Entity,
        scope: ConfigScope,
        id: String,
    },

    #[error("{entity} does not exist in {scope} config: {id}")]
    NotFound {
        entity: Entity,
        scope: ConfigScope,
        id: String,
    },

    // ==================
    // Sessions
    // ==================

    /// The server no longer recognises this session's signer
    #[error("failed to obtain server's certificate")]
    ServerCertificateUnavailable,

    /// Connection settings are unusable
    #[error("invalid connection config: {0}")]
    InvalidConfig(String),

    // ==================
    // Lower Layers
    // ==================

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ClientError {
    /// True for validation failures the caller can fix within the same context
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::AlreadyExists { .. } | ClientError::NotFound { .. }
        )
    }

    /// True when the session must be rebuilt with new credentials
    pub fn requires_new_session(&self) -> bool {
        matches!(self, ClientError::ServerCertificateUnavailable)
    }

    pub(crate) fn already_exists(entity: Entity, scope: ConfigScope, id: &str) -> Self {
        ClientError::AlreadyExists {
            entity,
            scope,
            id: id.to_string(),
        }
    }

    pub(crate) fn not_found(entity: Entity, scope: ConfigScope, id: &str) -> Self {
        ClientError::NotFound {
            entity,
            scope,
            id: id.to_string(),
        }
    }
}
