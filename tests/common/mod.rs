//! Test utilities
//!
//! - Generating a CA plus per-user certificate and key files
//! - Starting a one-node, one-admin cluster backed by the in-memory ledger
//! - Serving that ledger over HTTP for REST tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aerodb_sdk::config::SessionConfig;
use aerodb_sdk::crypto::pem::{read_pem, write_pem, CERTIFICATE_LABEL, PRIVATE_KEY_LABEL};
use aerodb_sdk::crypto::{ca_root, generate_signing_key, Certificate, SigningIdentity};
use aerodb_sdk::transport::rest::{
    ErrorResponse, GET_CONFIG_PATH, GET_NODE_CONFIG_PATH, GET_STATE_PATH, GET_STATUS_PATH,
    GET_TX_RECEIPT_PATH, POST_CONFIG_TX_PATH, POST_DATA_TX_PATH,
};
use aerodb_sdk::transport::{EnvelopeTransport, InMemoryLedger, TransportError, TransportResult};
use aerodb_sdk::types::*;
use aerodb_sdk::{Admin, CertAuthConfig, ClusterConfig, Database, NodeConfig, Session};
use async_trait::async_trait;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use ed25519_dalek::SigningKey;
use serde::Serialize;
use tempfile::TempDir;

pub const CA_FILE_NAME: &str = "ca.pem";
pub const NODE_ID: &str = "testNode1";

/// Directory holding a CA root and `<name>.pem` / `<name>.key` per identity
pub struct CryptoDir {
    dir: TempDir,
    ca: SigningKey,
}

impl CryptoDir {
    pub fn generate(names: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create crypto dir");
        let ca = generate_signing_key();
        write_pem(&dir.path().join(CA_FILE_NAME), CERTIFICATE_LABEL, &ca_root(&ca))
            .expect("Failed to write CA root");

        let crypto = Self { dir, ca };
        for name in names {
            crypto.add(name);
        }
        crypto
    }

    /// Issue a certificate and key for one more identity
    pub fn add(&self, name: &str) {
        let key = generate_signing_key();
        let cert = Certificate::issue(&self.ca, &key.verifying_key()).to_bytes();
        write_pem(&self.cert_path(name), CERTIFICATE_LABEL, &cert).expect("Failed to write cert");
        write_pem(&self.key_path(name), PRIVATE_KEY_LABEL, &key.to_bytes())
            .expect("Failed to write key");
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn ca_path(&self) -> PathBuf {
        self.dir.path().join(CA_FILE_NAME)
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.pem", name))
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.key", name))
    }

    pub fn root(&self) -> Vec<u8> {
        ca_root(&self.ca)
    }

    pub fn certificate(&self, name: &str) -> Vec<u8> {
        read_pem(&self.cert_path(name), CERTIFICATE_LABEL).expect("Failed to read cert")
    }

    pub fn key(&self, name: &str) -> SigningKey {
        let bytes = read_pem(&self.key_path(name), PRIVATE_KEY_LABEL).expect("Failed to read key");
        let seed: [u8; 32] = bytes.as_slice().try_into().expect("Key is not 32 bytes");
        SigningKey::from_bytes(&seed)
    }

    pub fn identity(&self, user_id: &str, name: &str) -> SigningIdentity {
        SigningIdentity::load(user_id, &self.cert_path(name), &self.key_path(name))
            .expect("Failed to load identity")
    }

    pub fn session_config(&self, user_id: &str, name: &str) -> SessionConfig {
        SessionConfig::for_user(user_id, self.cert_path(name), self.key_path(name))
    }
}

/// Genesis configuration: node `testNode1` with the `server` identity,
/// admin `admin`, and the directory's CA as the only root
pub fn genesis(crypto: &CryptoDir) -> (ClusterConfig, NodeConfig) {
    let node = NodeConfig {
        id: NODE_ID.to_string(),
        address: "127.0.0.1".to_string(),
        port: 0,
        certificate: crypto.certificate("server"),
    };
    let config = ClusterConfig {
        nodes: vec![node.clone()],
        admins: vec![Admin {
            id: "admin".to_string(),
            certificate: crypto.certificate("admin"),
        }],
        cert_auth_config: CertAuthConfig {
            roots: vec![crypto.root()],
        },
    };
    (config, node)
}

/// One-node cluster with the SDK connected to it in-process
pub struct TestCluster {
    pub crypto: CryptoDir,
    pub ledger: Arc<InMemoryLedger>,
    pub counter: Arc<CountingTransport>,
    pub db: Database,
}

impl TestCluster {
    /// `names` must include `admin` and `server`
    pub fn start(names: &[&str]) -> Self {
        let crypto = CryptoDir::generate(names);
        let (config, node) = genesis(&crypto);
        let ledger = InMemoryLedger::new(config, node, crypto.key("server"))
            .expect("Failed to start ledger");
        let ledger = Arc::new(ledger);
        let counter = Arc::new(CountingTransport::new(ledger.clone()));
        let db = Database::with_transport(counter.clone()).with_trusted_roots(vec![crypto.root()]);

        Self {
            crypto,
            ledger,
            counter,
            db,
        }
    }

    /// Session for `user_id` using the credentials stored under its own name
    pub fn session(&self, user_id: &str) -> Session {
        self.session_with_credentials(user_id, user_id)
    }

    pub fn session_with_credentials(&self, user_id: &str, name: &str) -> Session {
        self.db
            .session(&self.crypto.session_config(user_id, name))
            .expect("Failed to open session")
    }

    /// Database over the same ledger whose config submissions misbehave
    pub fn database_with_fault(&self, fault: SubmitFault) -> Database {
        let transport = CountingTransport::new(self.ledger.clone()).with_submit_fault(fault);
        Database::with_transport(Arc::new(transport)).with_trusted_roots(vec![self.crypto.root()])
    }
}

/// How a config submission goes wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitFault {
    /// Accepted but never ordered, so no receipt ever appears
    Undecided,
    /// Connection fails after the envelope left the client
    Unreachable,
}

/// Transport wrapper counting configuration reads
pub struct CountingTransport {
    inner: Arc<InMemoryLedger>,
    config_reads: AtomicUsize,
    submit_fault: Option<SubmitFault>,
}

impl CountingTransport {
    pub fn new(inner: Arc<InMemoryLedger>) -> Self {
        Self {
            inner,
            config_reads: AtomicUsize::new(0),
            submit_fault: None,
        }
    }

    pub fn with_submit_fault(mut self, fault: SubmitFault) -> Self {
        self.submit_fault = Some(fault);
        self
    }

    pub fn config_reads(&self) -> usize {
        self.config_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvelopeTransport for CountingTransport {
    async fn get_state(
        &self,
        envelope: &GetStateQueryEnvelope,
    ) -> TransportResult<GetStateResponseEnvelope> {
        self.inner.get_state(envelope).await
    }

    async fn get_status(
        &self,
        envelope: &GetStatusQueryEnvelope,
    ) -> TransportResult<GetStatusResponseEnvelope> {
        self.inner.get_status(envelope).await
    }

    async fn get_config(
        &self,
        envelope: &GetConfigQueryEnvelope,
    ) -> TransportResult<GetConfigResponseEnvelope> {
        self.config_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_config(envelope).await
    }

    async fn get_node_config(
        &self,
        envelope: &GetNodeConfigQueryEnvelope,
    ) -> TransportResult<GetNodeConfigResponseEnvelope> {
        self.inner.get_node_config(envelope).await
    }

    async fn get_tx_receipt(
        &self,
        envelope: &GetTxReceiptQueryEnvelope,
    ) -> TransportResult<GetTxReceiptResponseEnvelope> {
        self.inner.get_tx_receipt(envelope).await
    }

    async fn submit_transaction(&self, envelope: &TransactionEnvelope) -> TransportResult<()> {
        self.inner.submit_transaction(envelope).await
    }

    async fn submit_config_transaction(&self, envelope: &ConfigTxEnvelope) -> TransportResult<()> {
        match self.submit_fault {
            None => self.inner.submit_config_transaction(envelope).await,
            Some(SubmitFault::Undecided) => Ok(()),
            Some(SubmitFault::Unreachable) => {
                Err(TransportError::Http("connection reset by peer".to_string()))
            }
        }
    }
}

// ==================
// REST gateway
// ==================

type Ledger = State<Arc<InMemoryLedger>>;

fn reply<T: Serialize>(result: TransportResult<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(ErrorResponse::from(&e))).into_response()
        }
    }
}

fn ack(result: TransportResult<()>) -> Response {
    match result {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => reply::<()>(Err(e)),
    }
}

async fn get_state(State(l): Ledger, Json(env): Json<GetStateQueryEnvelope>) -> Response {
    reply(l.get_state(&env).await)
}

async fn get_status(State(l): Ledger, Json(env): Json<GetStatusQueryEnvelope>) -> Response {
    reply(l.get_status(&env).await)
}

async fn get_config(State(l): Ledger, Json(env): Json<GetConfigQueryEnvelope>) -> Response {
    reply(l.get_config(&env).await)
}

async fn get_node_config(
    State(l): Ledger,
    Json(env): Json<GetNodeConfigQueryEnvelope>,
) -> Response {
    reply(l.get_node_config(&env).await)
}

async fn get_tx_receipt(State(l): Ledger, Json(env): Json<GetTxReceiptQueryEnvelope>) -> Response {
    reply(l.get_tx_receipt(&env).await)
}

async fn submit_data_tx(State(l): Ledger, Json(env): Json<TransactionEnvelope>) -> Response {
    ack(l.submit_transaction(&env).await)
}

async fn submit_config_tx(State(l): Ledger, Json(env): Json<ConfigTxEnvelope>) -> Response {
    ack(l.submit_config_transaction(&env).await)
}

/// Serve the ledger on an ephemeral local port; returns the base URL
pub async fn spawn_gateway(ledger: Arc<InMemoryLedger>) -> String {
    let router = Router::new()
        .route(&format!("/{}", GET_STATE_PATH), post(get_state))
        .route(&format!("/{}", GET_STATUS_PATH), post(get_status))
        .route(&format!("/{}", GET_CONFIG_PATH), post(get_config))
        .route(&format!("/{}", GET_NODE_CONFIG_PATH), post(get_node_config))
        .route(&format!("/{}", GET_TX_RECEIPT_PATH), post(get_tx_receipt))
        .route(&format!("/{}", POST_DATA_TX_PATH), post(submit_data_tx))
        .route(&format!("/{}", POST_CONFIG_TX_PATH), post(submit_config_tx))
        .with_state(ledger);

    serve(router).await
}

/// Serve any router on an ephemeral local port; returns the base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind gateway");
    let addr = listener.local_addr().expect("Failed to read gateway address");

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    format!("http://{}", addr)
}
