/// Transaction types for MeshChain
use crate::miner::REWARD_SENDER;
use uuid::Uuid;

/// Maximum length of a sender or recipient address string
pub const MAX_ADDRESS_LENGTH: usize = 256;

/// A value transfer between two addresses.
///
/// Field declaration order is part of the block hash: the canonical JSON
/// encoding follows it, so reordering fields changes every digest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub amount: f64,
    pub sender: String,
    pub recipient: String,
    pub transaction_id: String,
}

impl Transaction {
    /// Build a transaction with a freshly generated identifier.
    pub fn new(amount: f64, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Transaction {
            amount,
            sender: sender.into(),
            recipient: recipient.into(),
            transaction_id: new_transaction_id(),
        }
    }

    /// Mining reward issued to `recipient`
    pub fn reward(amount: f64, recipient: impl Into<String>) -> Self {
        Self::new(amount, REWARD_SENDER, recipient)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// True when `address` sends or receives in this transaction.
    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.recipient == address
    }
}

/// UUID v4 rendered without dashes.
pub fn new_transaction_id() -> String {
    Uuid::new_v4().simple().to_string()
}
