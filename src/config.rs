//! SDK Configuration
//!
//! Connection, session and transaction options. All structs deserialize
//! with serde and fall back to defaults for omitted fields.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A server the SDK may talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    /// Node ID of the replica
    pub id: String,

    /// Base URL of its REST endpoint
    pub endpoint: String,
}

/// How to reach the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Replicas to connect to; the first one is used
    pub replicas: Vec<Replica>,

    /// CA certificates trusted for server identities
    #[serde(default)]
    pub root_ca_paths: Vec<PathBuf>,

    /// Per-request timeout in milliseconds (default: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl ConnectionConfig {
    /// Connect to a single replica with default options
    pub fn single(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            replicas: vec![Replica {
                id: id.into(),
                endpoint: endpoint.into(),
            }],
            root_ca_paths: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Replica the SDK talks to
    pub fn primary(&self) -> Option<&Replica> {
        self.replicas.first()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.replicas.is_empty() {
            return Err("connection config lists no replicas".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("request timeout must be positive".to_string());
        }
        Ok(())
    }
}

/// Credentials of the user a session acts for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub user_id: String,
    pub cert_path: PathBuf,
    pub private_key_path: PathBuf,
}

/// Options for committing transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// How long a synchronous commit waits for a receipt (default: 10000)
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Delay between receipt polls during a synchronous commit (default: 20)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_commit_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    20
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            commit_timeout_ms: default_commit_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TxOptions {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub user: UserConfig,

    #[serde(default)]
    pub tx: TxOptions,
}

impl SessionConfig {
    /// Session for a user with default transaction options
    pub fn for_user(
        user_id: impl Into<String>,
        cert_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            user: UserConfig {
                user_id: user_id.into(),
                cert_path: cert_path.into(),
                private_key_path: private_key_path.into(),
            },
            tx: TxOptions::default(),
        }
    }
}
