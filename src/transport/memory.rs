//! # In-Memory Ledger
//!
//! An in-process `EnvelopeTransport` that behaves like a single-node server:
//! it authenticates envelopes against the committed configuration, orders
//! every transaction into its own block and answers with node-signed
//! responses. Used for testing and for embedding.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde::Serialize;

use super::errors::{TransportError, TransportResult};
use super::{ensure_signed, EnvelopeTransport};
use crate::crypto::{verify_signature, Certificate, SigningIdentity};
use crate::types::{
    admin_exists, node_exists, ClusterConfig, ConfigTransaction, ConfigTxEnvelope, Envelope,
    GetConfigQueryEnvelope, GetConfigResponse, GetConfigResponseEnvelope,
    GetNodeConfigQueryEnvelope, GetNodeConfigResponse, GetNodeConfigResponseEnvelope,
    GetStateQueryEnvelope, GetStateResponse, GetStateResponseEnvelope, GetStatusQueryEnvelope,
    GetStatusResponse, GetStatusResponseEnvelope, GetTxReceiptQuery, GetTxReceiptQueryEnvelope,
    GetTxReceiptResponse, GetTxReceiptResponseEnvelope, NodeConfig, Transaction,
    TransactionEnvelope, TxReceipt, ValidationFlag, ValidationInfo, Version,
};

/// Database created with every ledger
pub const DEFAULT_DB_NAME: &str = "bdb";

type KvStore = HashMap<String, (Vec<u8>, Version)>;

#[derive(Debug)]
struct LedgerState {
    config: ClusterConfig,
    config_version: Version,
    height: u64,
    users: HashMap<String, Vec<u8>>,
    databases: HashMap<String, KvStore>,
    receipts: HashMap<String, TxReceipt>,
    /// Signer of each ordered transaction, with the certificate it signed with
    submitters: HashMap<String, (String, Vec<u8>)>,
}

impl LedgerState {
    /// Registered certificate of a user; admins shadow nodes, nodes shadow plain users
    fn certificate_of(&self, user_id: &str) -> Option<&[u8]> {
        let (found, index) = admin_exists(user_id, &self.config.admins);
        if found {
            return Some(&self.config.admins[index].certificate);
        }
        let (found, index) = node_exists(user_id, &self.config.nodes);
        if found {
            return Some(&self.config.nodes[index].certificate);
        }
        self.users.get(user_id).map(Vec::as_slice)
    }

    fn authenticate<T: Serialize>(
        &self,
        user_id: &str,
        payload: &T,
        signature: &[u8],
    ) -> TransportResult<()> {
        let certificate = self.certificate_of(user_id).ok_or_else(|| {
            TransportError::unauthorised(format!("user {} is not recognised", user_id))
        })?;

        verify_signature(certificate, payload, signature).map_err(|_| {
            TransportError::unauthorised(format!("signature of user {} does not verify", user_id))
        })
    }

    /// Receipt queries are also accepted from the submitter of that
    /// transaction, signing with the certificate it was submitted under.
    /// A config transaction may rotate or remove that certificate.
    fn authenticate_receipt_query(
        &self,
        query: &GetTxReceiptQuery,
        signature: &[u8],
    ) -> TransportResult<()> {
        let current = self.authenticate(&query.user_id, query, signature);
        if current.is_ok() {
            return current;
        }

        match self.submitters.get(&query.tx_id) {
            Some((submitter, certificate))
                if *submitter == query.user_id
                    && verify_signature(certificate, query, signature).is_ok() =>
            {
                Ok(())
            }
            _ => current,
        }
    }

    fn ensure_new_tx(&self, tx_id: &str) -> TransportResult<()> {
        if tx_id.is_empty() {
            return Err(TransportError::bad_request("empty transaction ID"));
        }
        if self.receipts.contains_key(tx_id) {
            return Err(TransportError::Conflict(format!(
                "transaction {} already submitted",
                tx_id
            )));
        }
        Ok(())
    }

    /// Order a decided transaction into the next block
    fn append_block(&mut self, tx_id: &str, submitter: &str, validation: ValidationInfo) -> u64 {
        let certificate = self
            .certificate_of(submitter)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        self.submitters
            .insert(tx_id.to_string(), (submitter.to_string(), certificate));

        self.height += 1;
        self.receipts.insert(
            tx_id.to_string(),
            TxReceipt {
                tx_id: tx_id.to_string(),
                block_num: self.height,
                tx_index: 0,
                validation,
            },
        );
        self.height
    }

    fn validate_config_tx(&self, tx: &ConfigTransaction) -> ValidationInfo {
        let (is_admin, _) = admin_exists(&tx.user_id, &self.config.admins);
        if !is_admin {
            return ValidationInfo::invalid(
                ValidationFlag::InvalidUnauthorised,
                format!("user {} is not an admin", tx.user_id),
            );
        }

        if tx.read_old_config_version != Some(self.config_version) {
            return ValidationInfo::invalid(
                ValidationFlag::InvalidMvccConflict,
                format!(
                    "config version changed: current {}, read {}",
                    self.config_version,
                    tx.read_old_config_version
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "none".to_string())
                ),
            );
        }

        if let Err(violation) = tx.new_config.validate() {
            return ValidationInfo::invalid(
                ValidationFlag::InvalidIncorrectEntries,
                violation.to_string(),
            );
        }

        let roots = &tx.new_config.cert_auth_config.roots;
        let certificates = tx
            .new_config
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.certificate.as_slice()))
            .chain(
                tx.new_config
                    .admins
                    .iter()
                    .map(|a| (a.id.as_str(), a.certificate.as_slice())),
            );

        for (id, certificate) in certificates {
            let trusted = Certificate::from_bytes(certificate)
                .and_then(|cert| cert.verify_against_roots(roots));
            if let Err(e) = trusted {
                return ValidationInfo::invalid(
                    ValidationFlag::InvalidIncorrectEntries,
                    format!("certificate of {}: {}", id, e),
                );
            }
        }

        ValidationInfo::valid()
    }

    fn validate_data_tx(&self, tx: &Transaction) -> ValidationInfo {
        let Some(store) = self.databases.get(&tx.db_name) else {
            return ValidationInfo::invalid(
                ValidationFlag::InvalidIncorrectEntries,
                format!("database {} does not exist", tx.db_name),
            );
        };

        for read in &tx.reads {
            let current = store.get(&read.key).map(|(_, version)| *version);
            if current != read.version {
                return ValidationInfo::invalid(
                    ValidationFlag::InvalidMvccConflict,
                    format!("key {} changed since it was read", read.key),
                );
            }
        }

        ValidationInfo::valid()
    }
}

/// Single-node ledger held in memory
#[derive(Debug)]
pub struct InMemoryLedger {
    node: NodeConfig,
    identity: SigningIdentity,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Start a ledger whose genesis block holds `genesis`.
    ///
    /// `node` is the responding node; `node_key` must match its certificate.
    pub fn new(
        genesis: ClusterConfig,
        node: NodeConfig,
        node_key: SigningKey,
    ) -> TransportResult<Self> {
        genesis
            .validate()
            .map_err(|v| TransportError::bad_request(v.to_string()))?;
        let identity = SigningIdentity::new(node.id.clone(), node.certificate.clone(), node_key)
            .map_err(|e| TransportError::bad_request(e.to_string()))?;

        let mut databases = HashMap::new();
        databases.insert(DEFAULT_DB_NAME.to_string(), KvStore::new());

        Ok(Self {
            node,
            identity,
            state: RwLock::new(LedgerState {
                config: genesis,
                config_version: Version::new(1, 0),
                height: 1,
                users: HashMap::new(),
                databases,
                receipts: HashMap::new(),
                submitters: HashMap::new(),
            }),
        })
    }

    /// Register a non-admin user allowed to query and submit data transactions
    pub fn register_user(&self, user_id: &str, certificate: Vec<u8>) -> TransportResult<()> {
        self.write()?.users.insert(user_id.to_string(), certificate);
        Ok(())
    }

    pub fn create_database(&self, db_name: &str) -> TransportResult<()> {
        self.write()?
            .databases
            .entry(db_name.to_string())
            .or_default();
        Ok(())
    }

    /// Committed configuration, read without authentication
    pub fn config(&self) -> TransportResult<(ClusterConfig, Version)> {
        let state = self.read()?;
        Ok((state.config.clone(), state.config_version))
    }

    /// Number of blocks ordered so far, genesis included
    pub fn height(&self) -> TransportResult<u64> {
        Ok(self.read()?.height)
    }

    fn read(&self) -> TransportResult<RwLockReadGuard<'_, LedgerState>> {
        self.state.read().map_err(|_| TransportError::Rejected {
            status: 500,
            message: "ledger lock poisoned".to_string(),
        })
    }

    fn write(&self) -> TransportResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state.write().map_err(|_| TransportError::Rejected {
            status: 500,
            message: "ledger lock poisoned".to_string(),
        })
    }

    fn respond<R: Serialize>(&self, payload: R) -> TransportResult<Envelope<R>> {
        self.identity.sign_envelope(payload).map_err(|e| TransportError::Rejected {
            status: 500,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl EnvelopeTransport for InMemoryLedger {
    async fn get_state(
        &self,
        envelope: &GetStateQueryEnvelope,
    ) -> TransportResult<GetStateResponseEnvelope> {
        ensure_signed(envelope)?;
        let query = &envelope.payload;

        let response = {
            let state = self.read()?;
            state.authenticate(&query.user_id, query, &envelope.signature)?;

            let store = state.databases.get(&query.db_name).ok_or_else(|| {
                TransportError::NotFound(format!("database {} does not exist", query.db_name))
            })?;
            match store.get(&query.key) {
                Some((value, version)) => GetStateResponse {
                    value: value.clone(),
                    version: Some(*version),
                },
                None => GetStateResponse {
                    value: Vec::new(),
                    version: None,
                },
            }
        };

        self.respond(response)
    }

    async fn get_status(
        &self,
        envelope: &GetStatusQueryEnvelope,
    ) -> TransportResult<GetStatusResponseEnvelope> {
        ensure_signed(envelope)?;
        let query = &envelope.payload;

        let exists = {
            let state = self.read()?;
            state.authenticate(&query.user_id, query, &envelope.signature)?;
            state.databases.contains_key(&query.db_name)
        };

        self.respond(GetStatusResponse {
            db_name: query.db_name.clone(),
            exists,
        })
    }

    async fn get_config(
        &self,
        envelope: &GetConfigQueryEnvelope,
    ) -> TransportResult<GetConfigResponseEnvelope> {
        ensure_signed(envelope)?;
        let query = &envelope.payload;

        let response = {
            let state = self.read()?;
            state.authenticate(&query.user_id, query, &envelope.signature)?;
            GetConfigResponse {
                config: state.config.clone(),
                version: state.config_version,
            }
        };

        self.respond(response)
    }

    async fn get_node_config(
        &self,
        envelope: &GetNodeConfigQueryEnvelope,
    ) -> TransportResult<GetNodeConfigResponseEnvelope> {
        ensure_signed(envelope)?;
        let query = &envelope.payload;

        self.read()?
            .authenticate(&query.user_id, query, &envelope.signature)?;

        self.respond(GetNodeConfigResponse {
            node: self.node.clone(),
        })
    }

    async fn get_tx_receipt(
        &self,
        envelope: &GetTxReceiptQueryEnvelope,
    ) -> TransportResult<GetTxReceiptResponseEnvelope> {
        ensure_signed(envelope)?;
        let query = &envelope.payload;

        let receipt = {
            let state = self.read()?;
            state.authenticate_receipt_query(query, &envelope.signature)?;
            state.receipts.get(&query.tx_id).cloned().ok_or_else(|| {
                TransportError::NotFound(format!("receipt for transaction {}", query.tx_id))
            })?
        };

        self.respond(GetTxReceiptResponse { receipt })
    }

    async fn submit_transaction(&self, envelope: &TransactionEnvelope) -> TransportResult<()> {
        ensure_signed(envelope)?;
        let tx = &envelope.payload;

        let mut state = self.write()?;
        state.authenticate(&tx.user_id, tx, &envelope.signature)?;
        state.ensure_new_tx(&tx.tx_id)?;

        let validation = state.validate_data_tx(tx);
        let is_valid = validation.flag == ValidationFlag::Valid;
        let block_num = state.append_block(&tx.tx_id, &tx.user_id, validation);

        if is_valid {
            let version = Version::new(block_num, 0);
            if let Some(store) = state.databases.get_mut(&tx.db_name) {
                for write in &tx.writes {
                    if write.is_delete {
                        store.remove(&write.key);
                    } else {
                        store.insert(write.key.clone(), (write.value.clone(), version));
                    }
                }
            }
        }
        Ok(())
    }

    async fn submit_config_transaction(&self, envelope: &ConfigTxEnvelope) -> TransportResult<()> {
        ensure_signed(envelope)?;
        let tx = &envelope.payload;

        let mut state = self.write()?;
        state.authenticate(&tx.user_id, tx, &envelope.signature)?;
        state.ensure_new_tx(&tx.tx_id)?;

        let validation = state.validate_config_tx(tx);
        let is_valid = validation.flag == ValidationFlag::Valid;
        let block_num = state.append_block(&tx.tx_id, &tx.user_id, validation);

        if is_valid {
            state.config = tx.new_config.clone();
            state.config_version = Version::new(block_num, 0);
        }
        Ok(())
    }
}
