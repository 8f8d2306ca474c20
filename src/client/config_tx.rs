//! # Configuration Transaction Context
//!
//! Stages mutations to the cluster configuration and finalizes them exactly
//! once, by a signed commit or an abort.
//!
//! ## Invariants
//! - Every public operation fails with `TxSpent` once the context left `Active`,
//!   before any other validation
//! - The committed snapshot is fetched at most once per context
//! - Callers only ever receive copies of the staged configuration
//! - A failed mutation leaves the pending configuration unchanged
//! - Existence checks run against the committed snapshot first, then pending

use std::fmt;
use std::sync::Arc;

use super::errors::{ClientError, ClientResult, ConfigScope, Entity};
use crate::config::TxOptions;
use crate::crypto::{compute_tx_id, verify_signature, SigningIdentity};
use crate::observability::{log_event_with_fields, Event};
use crate::transport::{EnvelopeTransport, TransportError};
use crate::types::{
    admin_exists, node_exists, Admin, ClusterConfig, ConfigTransaction, GetConfigQuery,
    GetTxReceiptQuery, NodeConfig, TxReceipt, Version,
};

/// Lifecycle of a context; both non-active states are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    Aborted,
}

/// A cluster member addressable by ID
trait Member: Clone {
    const ENTITY: Entity;

    fn id(&self) -> &str;

    fn lookup(id: &str, members: &[Self]) -> (bool, usize);
}

impl Member for Admin {
    const ENTITY: Entity = Entity::Admin;

    fn id(&self) -> &str {
        &self.id
    }

    fn lookup(id: &str, members: &[Self]) -> (bool, usize) {
        admin_exists(id, members)
    }
}

impl Member for NodeConfig {
    const ENTITY: Entity = Entity::Node;

    fn id(&self) -> &str {
        &self.id
    }

    fn lookup(id: &str, members: &[Self]) -> (bool, usize) {
        node_exists(id, members)
    }
}

fn stage_add<T: Member>(committed: &[T], pending: &mut Vec<T>, member: T) -> ClientResult<()> {
    if T::lookup(member.id(), committed).0 {
        return Err(ClientError::already_exists(T::ENTITY, ConfigScope::Current, member.id()));
    }
    if T::lookup(member.id(), pending).0 {
        return Err(ClientError::already_exists(T::ENTITY, ConfigScope::Pending, member.id()));
    }
    pending.push(member);
    Ok(())
}

fn stage_delete<T: Member>(committed: &[T], pending: &mut Vec<T>, id: &str) -> ClientResult<()> {
    if !T::lookup(id, committed).0 {
        return Err(ClientError::not_found(T::ENTITY, ConfigScope::Current, id));
    }
    let (found, index) = T::lookup(id, pending);
    if !found {
        return Err(ClientError::not_found(T::ENTITY, ConfigScope::Pending, id));
    }
    pending.remove(index);
    Ok(())
}

fn stage_update<T: Member>(committed: &[T], pending: &mut [T], member: T) -> ClientResult<()> {
    if !T::lookup(member.id(), committed).0 {
        return Err(ClientError::not_found(T::ENTITY, ConfigScope::Current, member.id()));
    }
    let (found, index) = T::lookup(member.id(), pending);
    if !found {
        return Err(ClientError::not_found(T::ENTITY, ConfigScope::Pending, member.id()));
    }
    pending[index] = member;
    Ok(())
}

/// Committed snapshot plus the working copy derived from it
#[derive(Debug)]
struct Staged {
    committed: ClusterConfig,
    version: Version,
    pending: ClusterConfig,
}

/// One configuration transaction; see the module docs for its guarantees.
///
/// Not meant to be shared between tasks: every operation takes `&mut self`.
pub struct ConfigTxContext {
    identity: Arc<SigningIdentity>,
    transport: Arc<dyn EnvelopeTransport>,
    server_certificate: Vec<u8>,
    options: TxOptions,
    tx_id: String,
    state: TxState,
    staged: Option<Staged>,
}

impl ConfigTxContext {
    pub(crate) fn new(
        identity: Arc<SigningIdentity>,
        transport: Arc<dyn EnvelopeTransport>,
        server_certificate: Vec<u8>,
        options: TxOptions,
    ) -> Self {
        let tx_id = compute_tx_id(identity.certificate());
        log_event_with_fields(
            Event::ConfigTxOpened,
            &[("tx_id", tx_id.as_str()), ("user_id", identity.user_id())],
        );

        Self {
            identity,
            transport,
            server_certificate,
            options,
            tx_id,
            state: TxState::Active,
            staged: None,
        }
    }

    /// Identifier the transaction will be submitted under
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Copy of the configuration with this transaction's mutations applied.
    ///
    /// The first call fetches the committed configuration from the server.
    pub async fn get_cluster_config(&mut self) -> ClientResult<ClusterConfig> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        Ok(staged.pending.clone())
    }

    pub async fn add_admin(&mut self, admin: Admin) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_add(&staged.committed.admins, &mut staged.pending.admins, admin)
    }

    pub async fn delete_admin(&mut self, id: &str) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_delete(&staged.committed.admins, &mut staged.pending.admins, id)
    }

    /// Replace an admin, typically to rotate its certificate
    pub async fn update_admin(&mut self, admin: Admin) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_update(&staged.committed.admins, &mut staged.pending.admins, admin)
    }

    pub async fn add_cluster_node(&mut self, node: NodeConfig) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_add(&staged.committed.nodes, &mut staged.pending.nodes, node)
    }

    pub async fn delete_cluster_node(&mut self, id: &str) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_delete(&staged.committed.nodes, &mut staged.pending.nodes, id)
    }

    /// Replace a node, typically to change its address or port
    pub async fn update_cluster_node(&mut self, node: NodeConfig) -> ClientResult<()> {
        self.ensure_active()?;
        let staged = self.staged().await?;
        stage_update(&staged.committed.nodes, &mut staged.pending.nodes, node)
    }

    /// Sign and submit the pending configuration.
    ///
    /// With `sync`, waits for the receipt and fails with `TxInvalidated` if the
    /// server rejected the transaction. Without it, returns right after
    /// submission and leaves the outcome to `Session::tx_receipt`.
    ///
    /// The context is spent as soon as the envelope reaches the transport,
    /// whatever happens next.
    pub async fn commit(&mut self, sync: bool) -> ClientResult<(String, Option<TxReceipt>)> {
        self.ensure_active()?;

        let (version, new_config) = {
            let staged = self.staged().await?;
            (staged.version, staged.pending.clone())
        };
        let envelope = self.identity.sign_envelope(ConfigTransaction {
            user_id: self.identity.user_id().to_string(),
            tx_id: self.tx_id.clone(),
            read_old_config_version: Some(version),
            new_config,
        })?;

        self.state = TxState::Committed;
        self.staged = None;

        if let Err(e) = self.transport.submit_config_transaction(&envelope).await {
            return Err(transport_failed("submit_config_transaction", e));
        }
        log_event_with_fields(Event::ConfigTxSubmitted, &[("tx_id", self.tx_id.as_str())]);

        if !sync {
            return Ok((self.tx_id.clone(), None));
        }

        let receipt = self.await_receipt().await?;
        if !receipt.is_valid() {
            log_event_with_fields(
                Event::ConfigTxInvalidated,
                &[
                    ("flag", receipt.validation.flag.as_str()),
                    ("reason", receipt.validation.reason.as_str()),
                    ("tx_id", self.tx_id.as_str()),
                ],
            );
            return Err(ClientError::TxInvalidated {
                tx_id: self.tx_id.clone(),
                flag: receipt.validation.flag,
                reason: receipt.validation.reason,
            });
        }

        let block = receipt.block_num.to_string();
        log_event_with_fields(
            Event::ConfigTxCommitted,
            &[("block_num", block.as_str()), ("tx_id", self.tx_id.as_str())],
        );
        Ok((self.tx_id.clone(), Some(receipt)))
    }

    /// Discard all staged mutations without submitting anything
    pub fn abort(&mut self) -> ClientResult<()> {
        self.ensure_active()?;
        self.state = TxState::Aborted;
        self.staged = None;
        log_event_with_fields(Event::ConfigTxAborted, &[("tx_id", self.tx_id.as_str())]);
        Ok(())
    }

    fn ensure_active(&self) -> ClientResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed | TxState::Aborted => Err(ClientError::TxSpent),
        }
    }

    async fn staged(&mut self) -> ClientResult<&mut Staged> {
        let staged = match self.staged.take() {
            Some(staged) => staged,
            None => self.fetch_config().await?,
        };
        Ok(self.staged.insert(staged))
    }

    async fn fetch_config(&self) -> ClientResult<Staged> {
        let query = self.identity.sign_envelope(GetConfigQuery {
            user_id: self.identity.user_id().to_string(),
        })?;

        let response = self
            .transport
            .get_config(&query)
            .await
            .map_err(|e| transport_failed("get_config", e))?;
        verify_signature(&self.server_certificate, &response.payload, &response.signature)?;

        let version = response.payload.version;
        let version_str = version.to_string();
        log_event_with_fields(
            Event::ConfigFetched,
            &[("tx_id", self.tx_id.as_str()), ("version", version_str.as_str())],
        );

        Ok(Staged {
            committed: response.payload.config.clone(),
            version,
            pending: response.payload.config,
        })
    }

    async fn await_receipt(&self) -> ClientResult<TxReceipt> {
        let poll = async {
            loop {
                if let Some(receipt) = fetch_receipt(
                    &self.identity,
                    self.transport.as_ref(),
                    &self.server_certificate,
                    &self.tx_id,
                )
                .await?
                {
                    return Ok::<_, ClientError>(receipt);
                }
                tokio::time::sleep(self.options.poll_interval()).await;
            }
        };

        tokio::time::timeout(self.options.commit_timeout(), poll)
            .await
            .map_err(|_| ClientError::CommitTimeout {
                tx_id: self.tx_id.clone(),
            })?
    }
}

impl fmt::Debug for ConfigTxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigTxContext")
            .field("tx_id", &self.tx_id)
            .field("user_id", &self.identity.user_id())
            .field("state", &self.state)
            .field("fetched", &self.staged.is_some())
            .finish_non_exhaustive()
    }
}

/// Fetch and verify the receipt of a transaction; `None` while undecided
pub(crate) async fn fetch_receipt(
    identity: &SigningIdentity,
    transport: &dyn EnvelopeTransport,
    server_certificate: &[u8],
    tx_id: &str,
) -> ClientResult<Option<TxReceipt>> {
    let query = identity.sign_envelope(GetTxReceiptQuery {
        user_id: identity.user_id().to_string(),
        tx_id: tx_id.to_string(),
    })?;

    let response = match transport.get_tx_receipt(&query).await {
        Ok(response) => response,
        Err(TransportError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(transport_failed("get_tx_receipt", e)),
    };
    verify_signature(server_certificate, &response.payload, &response.signature)?;

    let receipt = response.payload.receipt;
    if receipt.tx_id != tx_id {
        return Err(ClientError::Transport(TransportError::Decode(format!(
            "receipt is for transaction {}, expected {}",
            receipt.tx_id, tx_id
        ))));
    }
    Ok(Some(receipt))
}

pub(crate) fn transport_failed(operation: &str, err: TransportError) -> ClientError {
    let reason = err.to_string();
    log_event_with_fields(
        Event::TransportFailed,
        &[("operation", operation), ("reason", reason.as_str())],
    );
    ClientError::Transport(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(id: &str) -> Admin {
        Admin {
            id: id.to_string(),
            certificate: id.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_stage_add_checks_current_then_pending() {
        let committed = vec![admin("admin")];
        let mut pending = committed.clone();

        assert_eq!(
            stage_add(&committed, &mut pending, admin("admin")),
            Err(ClientError::already_exists(Entity::Admin, ConfigScope::Current, "admin"))
        );
        assert!(stage_add(&committed, &mut pending, admin("admin2")).is_ok());
        assert_eq!(
            stage_add(&committed, &mut pending, admin("admin2")),
            Err(ClientError::already_exists(Entity::Admin, ConfigScope::Pending, "admin2"))
        );
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_stage_add_of_deleted_member_still_current_duplicate() {
        let committed = vec![admin("admin"), admin("admin2")];
        let mut pending = committed.clone();

        stage_delete(&committed, &mut pending, "admin2").unwrap();
        assert_eq!(
            stage_add(&committed, &mut pending, admin("admin2")),
            Err(ClientError::already_exists(Entity::Admin, ConfigScope::Current, "admin2"))
        );
    }

    #[test]
    fn test_stage_delete_precedence() {
        let committed = vec![admin("admin"), admin("admin2")];
        let mut pending = committed.clone();

        assert!(stage_delete(&committed, &mut pending, "admin").is_ok());
        assert_eq!(
            stage_delete(&committed, &mut pending, "admin"),
            Err(ClientError::not_found(Entity::Admin, ConfigScope::Pending, "admin"))
        );
        assert_eq!(
            stage_delete(&committed, &mut pending, "non-admin"),
            Err(ClientError::not_found(Entity::Admin, ConfigScope::Current, "non-admin"))
        );
        assert_eq!(pending, vec![admin("admin2")]);
    }

    #[test]
    fn test_stage_delete_of_member_added_in_same_tx() {
        let committed = vec![admin("admin")];
        let mut pending = committed.clone();

        stage_add(&committed, &mut pending, admin("admin2")).unwrap();
        assert_eq!(
            stage_delete(&committed, &mut pending, "admin2"),
            Err(ClientError::not_found(Entity::Admin, ConfigScope::Current, "admin2"))
        );
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_stage_update_replaces_in_place() {
        let nodes = vec![NodeConfig {
            id: "node1".to_string(),
            address: "127.0.0.1".to_string(),
            port: 6001,
            certificate: vec![1],
        }];
        let mut pending = nodes.clone();

        let mut moved = nodes[0].clone();
        moved.port = 6002;
        stage_update(&nodes, &mut pending, moved.clone()).unwrap();
        assert_eq!(pending, vec![moved]);
        assert_eq!(nodes[0].port, 6001);

        let mut unknown = nodes[0].clone();
        unknown.id = "node9".to_string();
        assert_eq!(
            stage_update(&nodes, &mut pending, unknown),
            Err(ClientError::not_found(Entity::Node, ConfigScope::Current, "node9"))
        );
    }

    #[test]
    fn test_stage_update_after_delete_is_pending_miss() {
        let committed = vec![admin("admin"), admin("admin2")];
        let mut pending = committed.clone();

        stage_delete(&committed, &mut pending, "admin2").unwrap();
        assert_eq!(
            stage_update(&committed, &mut pending, admin("admin2")),
            Err(ClientError::not_found(Entity::Admin, ConfigScope::Pending, "admin2"))
        );
    }
}
