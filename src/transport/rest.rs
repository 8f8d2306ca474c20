//! # REST Client
//!
//! `EnvelopeTransport` over HTTP. Every envelope is POSTed as JSON to a
//! fixed path under the server's base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::errors::{TransportError, TransportResult};
use super::{ensure_signed, EnvelopeTransport};
use crate::types::{
    ConfigTxEnvelope, Envelope, GetConfigQueryEnvelope, GetConfigResponseEnvelope,
    GetNodeConfigQueryEnvelope, GetNodeConfigResponseEnvelope, GetStateQueryEnvelope,
    GetStateResponseEnvelope, GetStatusQueryEnvelope, GetStatusResponseEnvelope,
    GetTxReceiptQueryEnvelope, GetTxReceiptResponseEnvelope, TransactionEnvelope,
};

pub const GET_STATE_PATH: &str = "query/state";
pub const GET_STATUS_PATH: &str = "query/status";
pub const GET_CONFIG_PATH: &str = "query/config";
pub const GET_NODE_CONFIG_PATH: &str = "query/node";
pub const GET_TX_RECEIPT_PATH: &str = "query/receipt";
pub const POST_DATA_TX_PATH: &str = "tx/data";
pub const POST_CONFIG_TX_PATH: &str = "tx/config";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body returned by the server on non-success statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<&TransportError> for ErrorResponse {
    fn from(err: &TransportError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

/// HTTP client for one server
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    root: Url,
    client: reqwest::Client,
}

impl RestClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: &str) -> TransportResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests are cancelled after `timeout`
    pub fn with_timeout(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let root = parse_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.to_string(),
            root,
            client,
        })
    }

    /// The base URL exactly as given at construction
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The parsed base URL, normalised to end in `/`
    pub fn url(&self) -> &Url {
        &self.root
    }

    fn endpoint(&self, path: &str) -> TransportResult<Url> {
        self.root
            .join(path)
            .map_err(|e| TransportError::InvalidUrl {
                url: format!("{}{}", self.root, path),
                reason: e.to_string(),
            })
    }

    async fn send<P: Serialize>(
        &self,
        path: &str,
        envelope: &Envelope<P>,
    ) -> TransportResult<Response> {
        ensure_signed(envelope)?;

        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(envelope)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = match response.text().await {
            Ok(body) => serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body),
            Err(e) => e.to_string(),
        };
        Err(TransportError::from_status(status, message))
    }

    async fn query<P: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        envelope: &Envelope<P>,
    ) -> TransportResult<R> {
        let response = self.send(path, envelope).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn parse_base_url(base_url: &str) -> TransportResult<Url> {
    let invalid = |reason: &str| TransportError::InvalidUrl {
        url: base_url.to_string(),
        reason: reason.to_string(),
    };

    if base_url.trim().is_empty() {
        return Err(invalid("empty URL"));
    }

    let mut url = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    // Url::join replaces the last path segment unless the path ends in '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl EnvelopeTransport for RestClient {
    async fn get_state(
        &self,
        envelope: &GetStateQueryEnvelope,
    ) -> TransportResult<GetStateResponseEnvelope> {
        self.query(GET_STATE_PATH, envelope).await
    }

    async fn get_status(
        &self,
        envelope: &GetStatusQueryEnvelope,
    ) -> TransportResult<GetStatusResponseEnvelope> {
        self.query(GET_STATUS_PATH, envelope).await
    }

    async fn get_config(
        &self,
        envelope: &GetConfigQueryEnvelope,
    ) -> TransportResult<GetConfigResponseEnvelope> {
        self.query(GET_CONFIG_PATH, envelope).await
    }

    async fn get_node_config(
        &self,
        envelope: &GetNodeConfigQueryEnvelope,
    ) -> TransportResult<GetNodeConfigResponseEnvelope> {
        self.query(GET_NODE_CONFIG_PATH, envelope).await
    }

    async fn get_tx_receipt(
        &self,
        envelope: &GetTxReceiptQueryEnvelope,
    ) -> TransportResult<GetTxReceiptResponseEnvelope> {
        self.query(GET_TX_RECEIPT_PATH, envelope).await
    }

    async fn submit_transaction(&self, envelope: &TransactionEnvelope) -> TransportResult<()> {
        self.send(POST_DATA_TX_PATH, envelope).await.map(|_| ())
    }

    async fn submit_config_transaction(&self, envelope: &ConfigTxEnvelope) -> TransportResult<()> {
        self.send(POST_CONFIG_TX_PATH, envelope).await.map(|_| ())
    }
}
