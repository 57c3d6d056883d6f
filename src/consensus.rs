//! Peer consensus: broadcast, registration gossip and longest-chain adoption

use crate::blockchain::{validate_chain, AddressData, Block, Blockchain, ChainSnapshot};
use crate::error::ChainError;
use crate::miner::{proof_of_work, MINING_REWARD};
use crate::network::{
    validate_peer_url, BroadcastReport, PeerFailure, PeerRegistry, PeerTransport,
    BLOCKCHAIN_PATH, RECEIVE_BLOCK_PATH, REGISTER_NODES_BULK_PATH, REGISTER_NODE_PATH,
    TRANSACTION_PATH,
};
use crate::transaction::Transaction;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// A locally queued transaction and where it was forwarded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBroadcast {
    pub transaction: Transaction,
    pub block_index: u64,
    pub report: BroadcastReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineOutcome {
    pub block: Block,
    pub block_broadcast: BroadcastReport,
    pub reward: TransactionBroadcast,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    /// False when the node was already known.
    pub added: bool,
    pub notified: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub replaced: bool,
    pub chain_length: usize,
    /// Peer whose chain was adopted.
    pub source: Option<String>,
    /// Why the longest candidate was refused, if it was.
    pub rejected: Option<String>,
    pub unreachable: Vec<PeerFailure>,
}

/// Drives every protocol that involves more than one node.
///
/// Ledger and registry each sit behind their own lock. Mining takes a
/// separate mutex so two mining runs never overlap, and the proof-of-work
/// search itself runs without holding the ledger lock.
pub struct ConsensusCoordinator {
    ledger: Arc<RwLock<Blockchain>>,
    peers: Arc<RwLock<PeerRegistry>>,
    transport: Arc<dyn PeerTransport>,
    mining: Mutex<()>,
    reward_address: String,
}

impl ConsensusCoordinator {
    pub fn new(
        current_node_url: &str,
        reward_address: impl Into<String>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Blockchain::new(current_node_url))),
            peers: Arc::new(RwLock::new(PeerRegistry::new(current_node_url))),
            transport,
            mining: Mutex::new(()),
            reward_address: reward_address.into(),
        }
    }

    pub fn ledger(&self) -> Arc<RwLock<Blockchain>> {
        self.ledger.clone()
    }

    pub fn peers(&self) -> Arc<RwLock<PeerRegistry>> {
        self.peers.clone()
    }

    pub fn reward_address(&self) -> &str {
        &self.reward_address
    }

    pub async fn current_node_url(&self) -> String {
        self.peers.read().await.current_node_url().to_string()
    }

    pub async fn list_peers(&self) -> Vec<String> {
        self.peers.read().await.list()
    }

    pub async fn get_chain(&self) -> ChainSnapshot {
        let network_nodes = self.list_peers().await;
        self.ledger.read().await.snapshot(network_nodes)
    }

    /// Create a transaction, queue it here and forward it to every peer.
    pub async fn create_and_broadcast_transaction(
        &self,
        amount: f64,
        sender: &str,
        recipient: &str,
    ) -> Result<TransactionBroadcast, ChainError> {
        let tx = self
            .ledger
            .read()
            .await
            .create_transaction(amount, sender, recipient)?;
        self.broadcast_transaction(tx).await
    }

    /// Queue an existing transaction locally, then forward it to every peer.
    pub async fn broadcast_transaction(&self, tx: Transaction) -> Result<TransactionBroadcast, ChainError> {
        let block_index = self.ledger.write().await.queue_transaction(tx.clone())?;

        let peers = self.list_peers().await;
        let body = serde_json::to_value(&tx)?;
        let report = self.fan_out_post(&peers, TRANSACTION_PATH, body).await;

        info!(
            transaction_id = %tx.transaction_id,
            block_index,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "transaction broadcast"
        );

        Ok(TransactionBroadcast {
            transaction: tx,
            block_index,
            report,
        })
    }

    /// Intake for a transaction a peer forwarded. It is not re-broadcast.
    pub async fn queue_transaction(&self, tx: Transaction) -> Result<u64, ChainError> {
        self.ledger.write().await.queue_transaction(tx)
    }

    /// Mine the pending pool, announce the block and issue the mining reward.
    pub async fn mine(&self) -> Result<MineOutcome, ChainError> {
        let block = {
            let _mining = self.mining.lock().await;

            let template = self.ledger.read().await.mining_template()?;
            let previous_hash = template.previous_hash.clone();
            let payload = template.payload.clone();

            debug!(index = payload.index, transactions = payload.transactions.len(), "searching for nonce");
            let nonce = tokio::task::spawn_blocking(move || proof_of_work(&previous_hash, &payload))
                .await
                .map_err(|e| ChainError::InternalError(format!("Proof-of-work task failed: {}", e)))??;

            self.ledger.write().await.commit_mined(template, nonce)?
        };

        let peers = self.list_peers().await;
        let block_broadcast = self
            .fan_out_post(&peers, RECEIVE_BLOCK_PATH, json!({ "newBlock": block }))
            .await;

        let reward_tx = Transaction::reward(MINING_REWARD, self.reward_address.as_str());
        let reward = self.broadcast_transaction(reward_tx).await?;

        Ok(MineOutcome {
            block,
            block_broadcast,
            reward,
        })
    }

    /// Append a block announced by a peer if it extends the local tip.
    pub async fn receive_block(&self, block: Block) -> Result<(), ChainError> {
        self.ledger.write().await.receive_block(block)
    }

    /// Register one peer locally. Returns whether it was new.
    pub async fn register_peer(&self, address: &str) -> Result<bool, ChainError> {
        let url = validate_peer_url(address)?;
        let added = self.peers.write().await.register(&url);
        if added {
            info!(peer = %url, "peer registered");
        }
        Ok(added)
    }

    /// Register many peers; malformed entries are skipped.
    pub async fn register_peers_bulk(&self, addresses: &[String]) -> usize {
        let valid: Vec<String> = addresses
            .iter()
            .filter_map(|address| match validate_peer_url(address) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "skipping peer in bulk registration");
                    None
                }
            })
            .collect();

        let added = self.peers.write().await.register_bulk(&valid);
        info!(added, offered = addresses.len(), "bulk peer registration");
        added
    }

    /// Register a new node and introduce it to the whole mesh.
    ///
    /// Every known peer is told about the new node, then the new node receives
    /// the full peer list plus this node's URL. Any failed call fails the
    /// registration once all calls have settled.
    pub async fn register_and_broadcast(&self, address: &str) -> Result<RegistrationOutcome, ChainError> {
        let new_node = validate_peer_url(address)?;

        let (existing, added, current_node_url) = {
            let mut peers = self.peers.write().await;
            if new_node == peers.current_node_url() {
                return Err(ChainError::MalformedInput(
                    "A node cannot register itself".to_string(),
                ));
            }
            let existing: Vec<String> = peers
                .list()
                .into_iter()
                .filter(|peer| peer != &new_node)
                .collect();
            let added = peers.register(&new_node);
            (existing, added, peers.current_node_url().to_string())
        };

        let report = self
            .fan_out_post(&existing, REGISTER_NODE_PATH, json!({ "newNodeUrl": new_node }))
            .await;
        if let Some(err) = report.first_error() {
            return Err(err);
        }

        let mut all_network_nodes = self.list_peers().await;
        all_network_nodes.push(current_node_url);
        self.transport
            .post(
                &new_node,
                REGISTER_NODES_BULK_PATH,
                json!({ "allNetworkNodes": all_network_nodes }),
            )
            .await?;

        info!(peer = %new_node, notified = report.delivered.len(), "node joined the network");

        Ok(RegistrationOutcome {
            added,
            notified: report.delivered,
        })
    }

    /// Adopt the longest valid chain among peers if it beats the local one.
    ///
    /// Only the single longest candidate is validated; ties keep the local
    /// chain.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let peers = self.list_peers().await;
        let fetches = peers.iter().map(|peer| async move {
            let result = self
                .transport
                .get(peer, BLOCKCHAIN_PATH)
                .await
                .and_then(|value| serde_json::from_value::<ChainSnapshot>(value).map_err(ChainError::from));
            (peer.clone(), result)
        });

        let mut unreachable = Vec::new();
        let mut snapshots = Vec::new();
        for (peer, result) in join_all(fetches).await {
            match result {
                Ok(snapshot) => snapshots.push((peer, snapshot)),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "failed to fetch peer chain");
                    unreachable.push(PeerFailure {
                        peer,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let local_length = self.ledger.read().await.len();
        let mut longest: Option<(String, ChainSnapshot)> = None;
        let mut max_length = local_length;
        for (peer, snapshot) in snapshots {
            if snapshot.chain.len() > max_length {
                max_length = snapshot.chain.len();
                longest = Some((peer, snapshot));
            }
        }

        let kept = |chain_length: usize, rejected: Option<String>, unreachable: Vec<PeerFailure>| {
            ReconcileOutcome {
                replaced: false,
                chain_length,
                source: None,
                rejected,
                unreachable,
            }
        };

        let Some((peer, snapshot)) = longest else {
            debug!(length = local_length, "local chain is already the longest");
            return kept(local_length, None, unreachable);
        };

        if let Err(e) = validate_chain(&snapshot.chain) {
            warn!(peer = %peer, error = %e, "longest peer chain is invalid; keeping local chain");
            return kept(local_length, Some(e.to_string()), unreachable);
        }

        let mut ledger = self.ledger.write().await;
        if snapshot.chain.len() <= ledger.len() {
            debug!(peer = %peer, "local chain grew while reconciling; keeping it");
            return kept(ledger.len(), None, unreachable);
        }

        let chain_length = snapshot.chain.len();
        ledger.adopt_chain(snapshot.chain, snapshot.pending_transactions);
        info!(peer = %peer, chain_length, "adopted longer chain from peer");

        ReconcileOutcome {
            replaced: true,
            chain_length,
            source: Some(peer),
            rejected: None,
            unreachable,
        }
    }

    pub async fn find_block(&self, hash: &str) -> Option<Block> {
        self.ledger.read().await.find_block_by_hash(hash).cloned()
    }

    pub async fn find_transaction(&self, transaction_id: &str) -> Option<(Transaction, Block)> {
        self.ledger
            .read()
            .await
            .find_transaction_by_id(transaction_id)
            .map(|(tx, block)| (tx.clone(), block.clone()))
    }

    pub async fn address_data(&self, address: &str) -> AddressData {
        self.ledger.read().await.address_data(address)
    }

    /// POST `body` to `path` on every target and wait for all of them.
    async fn fan_out_post(&self, targets: &[String], path: &str, body: Value) -> BroadcastReport {
        let calls = targets.iter().map(|peer| {
            let body = body.clone();
            async move { (peer.clone(), self.transport.post(peer, path, body).await) }
        });

        let mut report = BroadcastReport::default();
        for (peer, result) in join_all(calls).await {
            match result {
                Ok(_) => report.delivered.push(peer),
                Err(e) => {
                    warn!(peer = %peer, path, error = %e, "peer call failed");
                    report.failed.push(PeerFailure {
                        peer,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
