use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

use super::chain::Block;

/// Everything a node exposes on its full-chain endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub current_node_url: String,
    #[serde(default)]
    pub network_nodes: Vec<String>,
}

/// On-chain history and balance of one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressData {
    pub address_transactions: Vec<Transaction>,
    pub address_balance: f64,
}

impl AddressData {
    /// Walk confirmed blocks oldest first. Pending transactions do not count.
    pub fn collect(blocks: &[Block], address: &str) -> Self {
        let address_transactions: Vec<Transaction> = blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.involves(address))
            .cloned()
            .collect();

        let address_balance = address_transactions.iter().fold(0.0, |mut balance, tx| {
            if tx.recipient == address {
                balance += tx.amount;
            }
            if tx.sender == address {
                balance -= tx.amount;
            }
            balance
        });

        AddressData {
            address_transactions,
            address_balance,
        }
    }
}
