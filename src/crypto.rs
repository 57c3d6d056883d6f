//! Hashing primitives for MeshChain

use crate::blockchain::BlockData;
use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// Canonical JSON encoding of a block payload.
///
/// `serde_json` writes struct fields in declaration order and never reorders
/// sequences, so the same payload always yields the same bytes. Non-finite
/// amounts would all collapse to `null`, so they are refused up front.
pub fn canonical_payload(payload: &BlockData) -> Result<String, ChainError> {
    if let Some(tx) = payload.transactions.iter().find(|tx| !tx.amount.is_finite()) {
        return Err(ChainError::MalformedInput(format!(
            "Transaction {} has a non-finite amount",
            tx.transaction_id
        )));
    }

    serde_json::to_string(payload)
        .map_err(|e| ChainError::MalformedInput(format!("Block payload is not serializable: {}", e)))
}

/// SHA-256 over `previous_hash || nonce || payload_json`, hex encoded.
pub fn digest_with_payload(previous_hash: &str, nonce: u64, payload_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hasher.update(payload_json.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of a block from its predecessor's hash, its nonce and its payload.
pub fn hash_block(previous_hash: &str, nonce: u64, payload: &BlockData) -> Result<String, ChainError> {
    let payload_json = canonical_payload(payload)?;
    Ok(digest_with_payload(previous_hash, nonce, &payload_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn payload() -> BlockData {
        BlockData {
            transactions: vec![
                Transaction::new(10.0, "x", "y"),
                Transaction::new(5.0, "y", "x"),
            ],
            index: 2,
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let data = payload();
        let a = hash_block("0", 42, &data).unwrap();
        let b = hash_block("0", 42, &data).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let data = payload();
        let mut reversed = data.clone();
        reversed.transactions.reverse();

        assert_ne!(
            hash_block("0", 42, &data).unwrap(),
            hash_block("0", 42, &reversed).unwrap()
        );
    }

    #[test]
    fn test_hash_depends_on_every_input() {
        let data = payload();
        let base = hash_block("0", 42, &data).unwrap();

        assert_ne!(base, hash_block("1", 42, &data).unwrap());
        assert_ne!(base, hash_block("0", 43, &data).unwrap());

        let mut other_index = data.clone();
        other_index.index = 3;
        assert_ne!(base, hash_block("0", 42, &other_index).unwrap());
    }

    #[test]
    fn test_hash_matches_manual_concatenation() {
        let data = BlockData {
            transactions: vec![],
            index: 2,
        };
        let expected = hex::encode(Sha256::digest(b"abc7{\"transactions\":[],\"index\":2}"));
        assert_eq!(hash_block("abc", 7, &data).unwrap(), expected);
    }

    #[test]
    fn test_non_finite_amount_is_rejected() {
        let data = BlockData {
            transactions: vec![Transaction::new(f64::NAN, "x", "y")],
            index: 2,
        };
        assert!(matches!(
            hash_block("0", 0, &data),
            Err(ChainError::MalformedInput(_))
        ));
    }
}
