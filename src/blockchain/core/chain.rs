use crate::crypto::hash_block;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{meets_difficulty, proof_of_work};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::state::{AddressData, ChainSnapshot};

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_NONCE: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: u64 = 0;

/// The part of a block covered by its hash besides the predecessor's hash and
/// the nonce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    pub transactions: Vec<Transaction>,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash: String,
    pub previous_block_hash: String,
}

impl Block {
    /// The fixed first block. Its nonce and hashes are sentinels, not
    /// proof-of-work output.
    pub fn genesis() -> Self {
        Block {
            index: GENESIS_INDEX,
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            previous_block_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    /// True when every sentinel field matches. The timestamp is not compared.
    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX
            && self.nonce == GENESIS_NONCE
            && self.hash == GENESIS_HASH
            && self.previous_block_hash == GENESIS_PREVIOUS_HASH
            && self.transactions.is_empty()
    }

    pub fn data(&self) -> BlockData {
        BlockData {
            transactions: self.transactions.clone(),
            index: self.index,
        }
    }

    /// Recompute the digest from this block's own contents.
    pub fn compute_hash(&self) -> Result<String, ChainError> {
        hash_block(&self.previous_block_hash, self.nonce, &self.data())
    }
}

/// Snapshot of the tip and pool taken before a proof-of-work search.
#[derive(Debug, Clone)]
pub struct MiningTemplate {
    pub previous_hash: String,
    pub payload: BlockData,
}

/// Chain plus pending pool for one node.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    current_node_url: String,
}

impl Blockchain {
    /// Create a chain holding only the genesis block.
    pub fn new(current_node_url: impl Into<String>) -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            mempool: Mempool::new(),
            current_node_url: current_node_url.into(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn current_node_url(&self) -> &str {
        &self.current_node_url
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Index the next mined block will carry.
    pub fn next_index(&self) -> Result<u64, ChainError> {
        Ok(self.last_block()?.index + 1)
    }

    /// Build a well-formed transaction. The pool is not touched.
    pub fn create_transaction(
        &self,
        amount: f64,
        sender: &str,
        recipient: &str,
    ) -> Result<Transaction, ChainError> {
        let tx = Transaction::new(amount, sender, recipient);
        tx.validate()?;
        Ok(tx)
    }

    /// Pool a transaction and return the index of the block it should land in.
    pub fn queue_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        tx.validate()?;
        let block_index = self.next_index()?;

        let id = tx.transaction_id.clone();
        if self.mempool.add_transaction(tx) {
            debug!(transaction_id = %id, block_index, "transaction queued");
        } else {
            debug!(transaction_id = %id, "transaction already pending");
        }

        Ok(block_index)
    }

    pub fn mining_template(&self) -> Result<MiningTemplate, ChainError> {
        let last = self.last_block()?;
        Ok(MiningTemplate {
            previous_hash: last.hash.clone(),
            payload: BlockData {
                transactions: self.mempool.get_all_transactions(),
                index: last.index + 1,
            },
        })
    }

    /// Append the block described by `template` with a solved `nonce`.
    ///
    /// Fails without touching state if the tip moved since the template was
    /// taken. Only the transactions in the template leave the pool.
    pub fn commit_mined(&mut self, template: MiningTemplate, nonce: u64) -> Result<Block, ChainError> {
        let last = self.last_block()?;
        if last.hash != template.previous_hash || last.index + 1 != template.payload.index {
            return Err(ChainError::ChainInconsistency(format!(
                "Chain tip moved while mining block {}: expected previous hash {}, tip is now {} at index {}",
                template.payload.index, template.previous_hash, last.hash, last.index
            )));
        }

        let hash = hash_block(&template.previous_hash, nonce, &template.payload)?;
        if !meets_difficulty(&hash) {
            return Err(ChainError::ChainInconsistency(format!(
                "Nonce {} does not satisfy the difficulty for block {}",
                nonce, template.payload.index
            )));
        }

        let MiningTemplate {
            previous_hash,
            payload: BlockData { transactions, index },
        } = template;

        let block = Block {
            index,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            transactions,
            nonce,
            hash,
            previous_block_hash: previous_hash,
        };

        self.mempool.remove_included(&block.transactions);
        self.blocks.push(block.clone());

        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = block.transactions.len(),
            "block mined"
        );

        Ok(block)
    }

    /// Mine the pending pool into a new block in one blocking call.
    pub fn mine_block(&mut self) -> Result<Block, ChainError> {
        let template = self.mining_template()?;
        let nonce = proof_of_work(&template.previous_hash, &template.payload)?;
        self.commit_mined(template, nonce)
    }

    /// Accept a block broadcast by a peer if it extends the local tip.
    ///
    /// Only the index and the link to the tip are checked; the proof-of-work
    /// is not re-verified here.
    pub fn receive_block(&mut self, block: Block) -> Result<(), ChainError> {
        for tx in &block.transactions {
            tx.validate()?;
        }

        let last = self.last_block()?;
        if block.index != last.index + 1 {
            warn!(expected = last.index + 1, got = block.index, "rejected block with wrong index");
            return Err(ChainError::ChainInconsistency(format!(
                "Invalid block index. Expected {}, but got {}.",
                last.index + 1,
                block.index
            )));
        }

        if block.previous_block_hash != last.hash {
            warn!(expected = %last.hash, got = %block.previous_block_hash, "rejected block with wrong link");
            return Err(ChainError::ChainInconsistency(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                last.hash, block.previous_block_hash
            )));
        }

        info!(index = block.index, hash = %block.hash, "block received");
        self.blocks.push(block);
        self.mempool.clear();
        Ok(())
    }

    /// Replace chain and pool wholesale. Callers validate `chain` first; the
    /// pool is rebuilt from `pending`, skipping malformed, duplicate and
    /// already confirmed transactions.
    pub fn adopt_chain(&mut self, chain: Vec<Block>, pending: Vec<Transaction>) {
        info!(
            old_length = self.blocks.len(),
            new_length = chain.len(),
            pending = pending.len(),
            "adopting chain"
        );
        self.blocks = chain;
        self.mempool = Mempool::new();

        for tx in pending {
            if let Err(e) = tx.validate() {
                warn!(transaction_id = %tx.transaction_id, error = %e, "dropping malformed pending transaction from adopted chain");
                continue;
            }
            if self.find_transaction_by_id(&tx.transaction_id).is_some() {
                warn!(transaction_id = %tx.transaction_id, "dropping pending transaction already confirmed in adopted chain");
                continue;
            }
            let transaction_id = tx.transaction_id.clone();
            if !self.mempool.add_transaction(tx) {
                warn!(transaction_id = %transaction_id, "dropping duplicate pending transaction from adopted chain");
            }
        }
    }

    pub fn find_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash == hash)
    }

    pub fn find_transaction_by_id(&self, transaction_id: &str) -> Option<(&Transaction, &Block)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.transaction_id == transaction_id)
                .map(|tx| (tx, block))
        })
    }

    pub fn address_data(&self, address: &str) -> AddressData {
        AddressData::collect(&self.blocks, address)
    }

    pub fn snapshot(&self, network_nodes: Vec<String>) -> ChainSnapshot {
        ChainSnapshot {
            chain: self.blocks.clone(),
            pending_transactions: self.mempool.get_all_transactions(),
            current_node_url: self.current_node_url.clone(),
            network_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::is_chain_valid;

    const NODE_URL: &str = "http://127.0.0.1:3001";

    #[test]
    fn test_new_chain_holds_genesis() {
        let chain = Blockchain::new(NODE_URL);
        assert_eq!(chain.len(), 1);

        let genesis = chain.last_block().unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.nonce, 100);
        assert_eq!(genesis.hash, "0");
        assert_eq!(genesis.previous_block_hash, "0");
    }

    #[test]
    fn test_create_transaction_does_not_pool() {
        let chain = Blockchain::new(NODE_URL);
        let tx = chain.create_transaction(10.0, "x", "y").unwrap();
        assert_eq!(tx.amount, 10.0);
        assert!(chain.mempool().is_empty());

        assert!(matches!(
            chain.create_transaction(-3.0, "x", "y"),
            Err(ChainError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_queue_transaction_returns_next_block_index() {
        let mut chain = Blockchain::new(NODE_URL);
        let tx = chain.create_transaction(10.0, "x", "y").unwrap();
        assert_eq!(chain.queue_transaction(tx.clone()).unwrap(), 2);
        assert_eq!(chain.queue_transaction(tx).unwrap(), 2);
        assert_eq!(chain.mempool().len(), 1);
    }

    #[test]
    fn test_mine_block_scenario() {
        let mut chain = Blockchain::new(NODE_URL);
        let a = chain.create_transaction(10.0, "x", "y").unwrap();
        let b = chain.create_transaction(5.0, "y", "x").unwrap();
        chain.queue_transaction(a.clone()).unwrap();
        chain.queue_transaction(b.clone()).unwrap();

        let block = chain.mine_block().unwrap();

        assert_eq!(block.transactions, vec![a, b]);
        assert_eq!(block.index, 2);
        assert_eq!(block.previous_block_hash, GENESIS_HASH);
        assert!(block.hash.starts_with("0000"));
        assert_eq!(block.compute_hash().unwrap(), block.hash);
        assert!(chain.mempool().is_empty());
        assert_eq!(chain.last_block().unwrap(), &block);
    }

    #[test]
    fn test_consecutive_blocks_link_up() {
        let mut chain = Blockchain::new(NODE_URL);
        let first = chain.mine_block().unwrap();
        let second = chain.mine_block().unwrap();

        assert_eq!(second.index, first.index + 1);
        assert_eq!(second.previous_block_hash, first.hash);
        assert!(is_chain_valid(chain.blocks()));
    }

    #[test]
    fn test_commit_rejects_stale_template() {
        let mut chain = Blockchain::new(NODE_URL);
        let template = chain.mining_template().unwrap();
        let nonce = proof_of_work(&template.previous_hash, &template.payload).unwrap();

        chain.mine_block().unwrap();
        let before = chain.len();

        assert!(matches!(
            chain.commit_mined(template, nonce),
            Err(ChainError::ChainInconsistency(_))
        ));
        assert_eq!(chain.len(), before);
    }

    #[test]
    fn test_commit_keeps_transactions_queued_during_search() {
        let mut chain = Blockchain::new(NODE_URL);
        let early = chain.create_transaction(1.0, "x", "y").unwrap();
        chain.queue_transaction(early.clone()).unwrap();

        let template = chain.mining_template().unwrap();
        let nonce = proof_of_work(&template.previous_hash, &template.payload).unwrap();

        let late = chain.create_transaction(2.0, "x", "y").unwrap();
        chain.queue_transaction(late.clone()).unwrap();

        let block = chain.commit_mined(template, nonce).unwrap();
        assert_eq!(block.transactions, vec![early]);
        assert_eq!(chain.mempool().get_all_transactions(), vec![late]);
    }

    #[test]
    fn test_receive_block_accepts_next_block() {
        let mut miner = Blockchain::new("http://127.0.0.1:3001");
        let mut peer = Blockchain::new("http://127.0.0.1:3002");
        peer.queue_transaction(Transaction::new(1.0, "a", "b")).unwrap();

        let block = miner.mine_block().unwrap();
        peer.receive_block(block.clone()).unwrap();

        assert_eq!(peer.len(), 2);
        assert_eq!(peer.last_block().unwrap(), &block);
        assert!(peer.mempool().is_empty());
    }

    #[test]
    fn test_receive_block_rejects_wrong_index_or_link() {
        let mut miner = Blockchain::new("http://127.0.0.1:3001");
        let mut peer = Blockchain::new("http://127.0.0.1:3002");
        let block = miner.mine_block().unwrap();

        let mut wrong_index = block.clone();
        wrong_index.index = 3;
        assert!(matches!(
            peer.receive_block(wrong_index),
            Err(ChainError::ChainInconsistency(_))
        ));

        let mut wrong_link = block.clone();
        wrong_link.previous_block_hash = "ffff".to_string();
        assert!(matches!(
            peer.receive_block(wrong_link),
            Err(ChainError::ChainInconsistency(_))
        ));

        assert_eq!(peer.len(), 1);
    }

    #[test]
    fn test_lookups() {
        let mut chain = Blockchain::new(NODE_URL);
        let tx = chain.create_transaction(3.0, "x", "y").unwrap();
        chain.queue_transaction(tx.clone()).unwrap();
        let block = chain.mine_block().unwrap();

        assert_eq!(chain.find_block_by_hash(&block.hash), Some(&block));
        assert!(chain.find_block_by_hash("missing").is_none());

        let (found_tx, found_block) = chain.find_transaction_by_id(&tx.transaction_id).unwrap();
        assert_eq!(found_tx, &tx);
        assert_eq!(found_block.index, 2);
        assert!(chain.find_transaction_by_id("missing").is_none());
    }

    #[test]
    fn test_adopt_chain_replaces_everything() {
        let mut longer = Blockchain::new("http://127.0.0.1:3002");
        longer.mine_block().unwrap();
        longer.mine_block().unwrap();

        let mut local = Blockchain::new(NODE_URL);
        local.queue_transaction(Transaction::new(1.0, "a", "b")).unwrap();

        let pending = vec![Transaction::new(2.0, "c", "d")];
        local.adopt_chain(longer.blocks().to_vec(), pending.clone());

        assert_eq!(local.blocks(), longer.blocks());
        assert_eq!(local.mempool().get_all_transactions(), pending);
        assert_eq!(local.current_node_url(), NODE_URL);
    }

    #[test]
    fn test_adopt_chain_filters_pending_pool() {
        let mut longer = Blockchain::new("http://127.0.0.1:3002");
        let confirmed = Transaction::new(4.0, "e", "f");
        longer.queue_transaction(confirmed.clone()).unwrap();
        longer.mine_block().unwrap();
        longer.mine_block().unwrap();

        let kept = Transaction::new(2.0, "c", "d");
        let pending = vec![
            kept.clone(),
            kept.clone(),
            Transaction::new(-50.0, "a", "b"),
            Transaction::new(1.0, "", "b"),
            confirmed.clone(),
        ];

        let mut local = Blockchain::new(NODE_URL);
        local.adopt_chain(longer.blocks().to_vec(), pending);

        assert_eq!(local.mempool().get_all_transactions(), vec![kept.clone()]);

        let block = local.mine_block().unwrap();
        assert_eq!(block.transactions, vec![kept]);
        assert_eq!(
            local.find_transaction_by_id(&confirmed.transaction_id).unwrap().1.index,
            2
        );
    }

    #[test]
    fn test_last_block_on_empty_chain() {
        let mut chain = Blockchain::new(NODE_URL);
        chain.adopt_chain(Vec::new(), Vec::new());
        assert_eq!(chain.last_block(), Err(ChainError::EmptyChain));
        assert!(matches!(chain.mine_block(), Err(ChainError::EmptyChain)));
    }

    #[test]
    fn test_block_wire_format() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(json["previousBlockHash"], "0");
        assert_eq!(json["nonce"], 100);
        assert!(json["transactions"].as_array().unwrap().is_empty());
    }
}
