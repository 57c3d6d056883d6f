use crate::error::ChainError;
use crate::miner::meets_difficulty;

use super::chain::Block;

/// Walk a candidate chain and certify structure and proof-of-work.
///
/// Returns the first failure found. Nothing is mutated; a single bad block
/// rejects the whole candidate.
pub fn validate_chain(candidate: &[Block]) -> Result<(), ChainError> {
    let genesis = candidate
        .first()
        .ok_or_else(|| ChainError::ChainInconsistency("Candidate chain is empty".to_string()))?;

    if !genesis.is_genesis() {
        return Err(ChainError::ChainInconsistency(
            "Genesis block does not match the sentinel values".to_string(),
        ));
    }

    for pair in candidate.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);

        if cur.index != prev.index + 1 {
            return Err(ChainError::ChainInconsistency(format!(
                "Block {} follows block {}; indexes must increase by one",
                cur.index, prev.index
            )));
        }

        if cur.previous_block_hash != prev.hash {
            return Err(ChainError::ChainInconsistency(format!(
                "Block {} links to {}, but the previous block hash is {}",
                cur.index, cur.previous_block_hash, prev.hash
            )));
        }

        let recomputed = crate::crypto::hash_block(&prev.hash, cur.nonce, &cur.data())?;
        if !meets_difficulty(&recomputed) {
            return Err(ChainError::ChainInconsistency(format!(
                "Block {} fails proof-of-work: digest {}",
                cur.index, recomputed
            )));
        }

        if recomputed != cur.hash {
            return Err(ChainError::ChainInconsistency(format!(
                "Block {} stores hash {}, but its contents hash to {}",
                cur.index, cur.hash, recomputed
            )));
        }
    }

    Ok(())
}

pub fn is_chain_valid(candidate: &[Block]) -> bool {
    validate_chain(candidate).is_ok()
}
