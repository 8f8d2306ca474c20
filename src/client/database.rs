//! # Database Handle
//!
//! Entry point of the SDK: owns the transport to the cluster and opens
//! sessions for users.

use std::fmt;
use std::sync::Arc;

use super::errors::{ClientError, ClientResult};
use super::session::Session;
use crate::config::{ConnectionConfig, SessionConfig, TxOptions};
use crate::crypto::pem::{read_pem, CERTIFICATE_LABEL};
use crate::crypto::SigningIdentity;
use crate::transport::{EnvelopeTransport, RestClient};

/// Connection to one cluster
#[derive(Clone)]
pub struct Database {
    transport: Arc<dyn EnvelopeTransport>,
    trusted_roots: Arc<Vec<Vec<u8>>>,
}

impl Database {
    /// Connect over REST to the first replica of `config`.
    ///
    /// CA roots listed in the config are loaded and used to check the
    /// identity of the server.
    pub fn connect(config: &ConnectionConfig) -> ClientResult<Self> {
        config.validate().map_err(ClientError::InvalidConfig)?;
        let replica = config
            .primary()
            .ok_or_else(|| ClientError::InvalidConfig("no replica".to_string()))?;

        let client = RestClient::with_timeout(&replica.endpoint, config.request_timeout())?;

        let mut roots = Vec::with_capacity(config.root_ca_paths.len());
        for path in &config.root_ca_paths {
            roots.push(read_pem(path, CERTIFICATE_LABEL)?);
        }

        Ok(Self::with_transport(Arc::new(client)).with_trusted_roots(roots))
    }

    /// Use an existing transport
    pub fn with_transport(transport: Arc<dyn EnvelopeTransport>) -> Self {
        Self {
            transport,
            trusted_roots: Arc::new(Vec::new()),
        }
    }

    /// Only accept servers whose certificate was issued by one of `roots`
    pub fn with_trusted_roots(mut self, roots: Vec<Vec<u8>>) -> Self {
        self.trusted_roots = Arc::new(roots);
        self
    }

    /// Open a session for the user named in `config`, loading its credentials
    pub fn session(&self, config: &SessionConfig) -> ClientResult<Session> {
        let identity = SigningIdentity::load(
            &config.user.user_id,
            &config.user.cert_path,
            &config.user.private_key_path,
        )?;
        Ok(self.session_with_identity(identity, config.tx.clone()))
    }

    /// Open a session for an identity already in memory
    pub fn session_with_identity(
        &self,
        identity: SigningIdentity,
        tx_options: TxOptions,
    ) -> Session {
        Session::new(
            identity,
            Arc::clone(&self.transport),
            Arc::clone(&self.trusted_roots),
            tx_options,
        )
    }

    pub fn transport(&self) -> &Arc<dyn EnvelopeTransport> {
        &self.transport
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("trusted_roots", &self.trusted_roots.len())
            .finish_non_exhaustive()
    }
}
