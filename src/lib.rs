//! aerodb-sdk - Client SDK for certificate-authenticated AeroDB clusters
//!
//! Stages changes to the cluster configuration (nodes, admins, CA roots) as
//! signed, one-shot transactions and submits them through an envelope
//! transport.

pub mod client;
pub mod config;
pub mod crypto;
pub mod observability;
pub mod transport;
pub mod types;

pub use client::{ClientError, ClientResult, ConfigTxContext, Database, Session, TxState};
pub use types::{admin_exists, node_exists, Admin, CertAuthConfig, ClusterConfig, NodeConfig};
