//! # Cluster Configuration Model
//!
//! The document that lists member nodes, administrators and trusted
//! certificate-authority roots of a cluster.
//!
//! ## Invariants
//! - Node IDs are pairwise distinct
//! - Admin IDs are pairwise distinct

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub id: String,

    /// Host the node listens on
    pub address: String,

    /// Port the node listens on
    pub port: u16,

    /// Node certificate bytes
    pub certificate: Vec<u8>,
}

/// An administrator allowed to sign configuration transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    /// Unique admin identifier
    pub id: String,

    /// Admin certificate bytes
    pub certificate: Vec<u8>,
}

/// Trust anchors for node and admin certificates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthConfig {
    pub roots: Vec<Vec<u8>>,
}

/// The committed configuration of the whole cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeConfig>,
    pub admins: Vec<Admin>,
    pub cert_auth_config: CertAuthConfig,
}

/// Revision of the configuration document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub block_num: u64,
    pub tx_num: u64,
}

impl Version {
    pub fn new(block_num: u64, tx_num: u64) -> Self {
        Self { block_num, tx_num }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_num, self.tx_num)
    }
}

/// Reasons a configuration document is structurally unacceptable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigViolation {
    NoNodes,
    NoAdmins,
    NoRoots,
    DuplicateNode(String),
    DuplicateAdmin(String),
    EmptyId,
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigViolation::NoNodes => write!(f, "cluster config has no nodes"),
            ConfigViolation::NoAdmins => write!(f, "cluster config has no admins"),
            ConfigViolation::NoRoots => write!(f, "cluster config has no CA roots"),
            ConfigViolation::DuplicateNode(id) => write!(f, "duplicate node ID: {}", id),
            ConfigViolation::DuplicateAdmin(id) => write!(f, "duplicate admin ID: {}", id),
            ConfigViolation::EmptyId => write!(f, "node or admin with empty ID"),
        }
    }
}

impl ClusterConfig {
    /// Check the structural invariants of the document
    pub fn validate(&self) -> Result<(), ConfigViolation> {
        if self.nodes.is_empty() {
            return Err(ConfigViolation::NoNodes);
        }
        if self.admins.is_empty() {
            return Err(ConfigViolation::NoAdmins);
        }
        if self.cert_auth_config.roots.is_empty() {
            return Err(ConfigViolation::NoRoots);
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(ConfigViolation::EmptyId);
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigViolation::DuplicateNode(node.id.clone()));
            }
        }

        seen.clear();
        for admin in &self.admins {
            if admin.id.is_empty() {
                return Err(ConfigViolation::EmptyId);
            }
            if !seen.insert(admin.id.as_str()) {
                return Err(ConfigViolation::DuplicateAdmin(admin.id.clone()));
            }
        }

        Ok(())
    }
}

/// Look up a node by ID.
///
/// Returns whether it was found and its position (0 when absent).
pub fn node_exists(id: &str, nodes: &[NodeConfig]) -> (bool, usize) {
    match nodes.iter().position(|n| n.id == id) {
        Some(index) => (true, index),
        None => (false, 0),
    }
}

/// Look up an admin by ID.
///
/// Returns whether it was found and its position (0 when absent).
pub fn admin_exists(id: &str, admins: &[Admin]) -> (bool, usize) {
    match admins.iter().position(|a| a.id == id) {
        Some(index) => (true, index),
        None => (false, 0),
    }
}
