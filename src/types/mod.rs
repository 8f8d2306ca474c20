//! # Types
//!
//! The cluster configuration model and the signed envelopes that carry
//! queries, transactions and responses between client and server.

pub mod cluster;
pub mod envelope;

pub use cluster::{
    admin_exists, node_exists, Admin, CertAuthConfig, ClusterConfig, ConfigViolation, NodeConfig,
    Version,
};
pub use envelope::*;
