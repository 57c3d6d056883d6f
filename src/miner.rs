//! Proof-of-work mining

use crate::blockchain::BlockData;
use crate::crypto::{canonical_payload, digest_with_payload};
use crate::error::ChainError;

/// Every block hash past genesis must start with this prefix.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Amount issued to a node for each block it mines.
pub const MINING_REWARD: f64 = 12.5;

/// Sender address reserved for reward issuance.
pub const REWARD_SENDER: &str = "00";

/// Check if hash meets difficulty requirement
pub fn meets_difficulty(hash: &str) -> bool {
    hash.starts_with(DIFFICULTY_PREFIX)
}

/// Search nonces upward from zero until the digest meets the difficulty.
///
/// Blocks the calling thread until a solution is found; run it on a blocking
/// worker when called from async code.
pub fn proof_of_work(previous_hash: &str, payload: &BlockData) -> Result<u64, ChainError> {
    let payload_json = canonical_payload(payload)?;
    let mut nonce: u64 = 0;

    loop {
        let hash = digest_with_payload(previous_hash, nonce, &payload_json);
        if meets_difficulty(&hash) {
            return Ok(nonce);
        }
        nonce = nonce
            .checked_add(1)
            .ok_or_else(|| ChainError::ChainInconsistency("Nonce space exhausted".to_string()))?;
    }
}
