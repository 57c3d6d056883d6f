//! Pending transaction pool

use crate::transaction::Transaction;
use std::collections::HashSet;

/// Transactions accepted but not yet embedded in a block, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction. Returns false when a transaction with the same id
    /// is already pending, so a gossip echo does not pool it twice.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        if self.contains(&tx.transaction_id) {
            return false;
        }
        self.transactions.push(tx);
        true
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.transaction_id == transaction_id)
    }

    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Drop every transaction that was included in a block.
    pub fn remove_included(&mut self, included: &[Transaction]) {
        let ids: HashSet<&str> = included
            .iter()
            .map(|tx| tx.transaction_id.as_str())
            .collect();
        self.transactions
            .retain(|tx| !ids.contains(tx.transaction_id.as_str()));
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
