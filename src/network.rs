//! Peer registry and the HTTP transport used to reach peers

use crate::error::ChainError;
use async_trait::async_trait;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Transaction intake for transactions forwarded by peers
pub const TRANSACTION_PATH: &str = "/transaction";
/// Create a transaction locally and broadcast it
pub const TRANSACTION_BROADCAST_PATH: &str = "/transaction/broadcast";
pub const MINE_PATH: &str = "/mine";
/// Block receipt for blocks mined by peers
pub const RECEIVE_BLOCK_PATH: &str = "/receive-new-block";
pub const REGISTER_AND_BROADCAST_PATH: &str = "/register-and-broadcast-node";
pub const REGISTER_NODE_PATH: &str = "/register-node";
pub const REGISTER_NODES_BULK_PATH: &str = "/register-nodes-bulk";
/// Full chain fetch
pub const BLOCKCHAIN_PATH: &str = "/blockchain";
pub const CONSENSUS_PATH: &str = "/consensus";

/// Normalize a peer base URL so `http://a:1/` and `http://a:1` compare equal.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Check that `url` is an absolute http(s) URL.
pub fn validate_peer_url(url: &str) -> Result<String, ChainError> {
    let normalized = normalize_url(url);
    let parsed = reqwest::Url::parse(&normalized)
        .map_err(|e| ChainError::MalformedInput(format!("Invalid node URL {:?}: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ChainError::MalformedInput(format!(
            "Node URL {:?} must be an http(s) URL with a host",
            url
        )));
    }

    Ok(normalized)
}

/// Known peers of this node. Grows only; never contains the node itself.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    current_node_url: String,
    peers: IndexSet<String>,
}

impl PeerRegistry {
    pub fn new(current_node_url: &str) -> Self {
        Self {
            current_node_url: normalize_url(current_node_url),
            peers: IndexSet::new(),
        }
    }

    pub fn current_node_url(&self) -> &str {
        &self.current_node_url
    }

    /// Add a peer. Returns false for duplicates, for this node's own URL, and
    /// for blank input.
    pub fn register(&mut self, address: &str) -> bool {
        let address = normalize_url(address);
        if address.is_empty() || address == self.current_node_url {
            return false;
        }
        self.peers.insert(address)
    }

    /// Register each address under the same rules. Returns how many were new.
    pub fn register_bulk<I, S>(&mut self, addresses: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for address in addresses {
            if self.register(address.as_ref()) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, address: &str) -> bool {
        self.peers.contains(&normalize_url(address))
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Errors raised while talking to a single peer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{url} returned an unreadable body: {reason}")]
    Decode { url: String, reason: String },
}

/// Outbound calls a node makes to its peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn post(&self, base_url: &str, path: &str, body: Value) -> Result<Value, ChainError>;
    async fn get(&self, base_url: &str, path: &str) -> Result<Value, ChainError>;
}

/// `PeerTransport` over JSON HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ChainError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn read_response(url: String, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| TransportError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    async fn send_post(&self, url: String, body: Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;
        Self::read_response(url, response).await
    }

    async fn send_get(&self, url: String) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;
        Self::read_response(url, response).await
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn post(&self, base_url: &str, path: &str, body: Value) -> Result<Value, ChainError> {
        let url = format!("{}{}", normalize_url(base_url), path);
        self.send_post(url, body)
            .await
            .map_err(|e| ChainError::peer_unreachable(base_url, e))
    }

    async fn get(&self, base_url: &str, path: &str) -> Result<Value, ChainError> {
        let url = format!("{}{}", normalize_url(base_url), path);
        self.send_get(url)
            .await
            .map_err(|e| ChainError::peer_unreachable(base_url, e))
    }
}

/// One peer call that did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerFailure {
    pub peer: String,
    pub reason: String,
}

/// Outcome of a fan-out to every peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<PeerFailure>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// First failure as a `PeerUnreachable` error, if any.
    pub fn first_error(&self) -> Option<ChainError> {
        self.failed
            .first()
            .map(|failure| ChainError::peer_unreachable(failure.peer.clone(), &failure.reason))
    }
}
