use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::valid_proof;

/// Walk `chain` pairwise and report the first broken link.
///
/// Checks, for each adjacent `(prev, block)`: consecutive indices,
/// `block.previous_hash == prev.hash()`, and `valid_proof(prev.proof, block.proof)`.
/// The first block must carry index 1; its contents are otherwise trusted,
/// since every node stamps its own genesis.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    let first = chain
        .first()
        .ok_or_else(|| ChainError::InvalidChain("Chain is empty".to_string()))?;
    if first.index != 1 {
        return Err(ChainError::InvalidChain(format!(
            "First block must have index 1, got {}",
            first.index
        )));
    }

    for pair in chain.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);

        if prev.index.checked_add(1) != Some(block.index) {
            return Err(ChainError::InvalidChain(format!(
                "Invalid block index after {}: got {}.",
                prev.index, block.index
            )));
        }

        let expected_hash = prev.hash();
        if block.previous_hash != expected_hash {
            return Err(ChainError::InvalidChain(format!(
                "Invalid previous block hash at index {}. Expected {}, but got {}.",
                block.index, expected_hash, block.previous_hash
            )));
        }

        if !valid_proof(prev.proof, block.proof) {
            return Err(ChainError::InvalidChain(format!(
                "Invalid proof of work at index {}: {} does not solve {}.",
                block.index, block.proof, prev.proof
            )));
        }
    }
    Ok(())
}

/// Boolean form of [`validate_chain`].
pub fn valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use crate::miner::proof_of_work;

    fn mined_chain(extra_blocks: usize) -> Vec<Block> {
        let mut bc = Blockchain::new();
        for i in 0..extra_blocks {
            bc.add_transaction("alice", "bob", i as u64);
            let proof = proof_of_work(bc.last_block().proof);
            bc.new_block(proof, None);
        }
        bc.chain().to_vec()
    }

    #[test]
    fn test_genesis_only_is_valid() {
        assert!(valid_chain(&mined_chain(0)));
    }

    #[test]
    fn test_mined_chain_is_valid() {
        assert!(valid_chain(&mined_chain(3)));
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        assert!(!valid_chain(&[]));
    }

    #[test]
    fn test_tampered_previous_hash() {
        let mut chain = mined_chain(3);
        chain[2].previous_hash = "0".repeat(64);
        let err = validate_chain(&chain).unwrap_err();
        assert!(err.to_string().contains("previous block hash at index 3"));
    }

    #[test]
    fn test_tampered_transaction_breaks_next_link() {
        let mut chain = mined_chain(3);
        chain[1].transactions[0].amount = 1_000_000u64.into();
        assert!(!valid_chain(&chain));
    }

    #[test]
    fn test_bad_proof() {
        let mut chain = mined_chain(1);
        chain[1].proof += 1;
        // previous_hash still matches genesis, only the proof is wrong
        let err = validate_chain(&chain).unwrap_err();
        assert!(err.to_string().contains("Invalid proof of work"));
    }

    #[test]
    fn test_index_gap() {
        let mut chain = mined_chain(2);
        chain[2].index = 7;
        assert!(!valid_chain(&chain));
    }

    #[test]
    fn test_tampered_last_block_is_undetected_by_linkage() {
        // Nothing links to the tip, so changing its payload keeps the chain valid.
        let mut chain = mined_chain(2);
        chain[2].transactions.clear();
        assert!(valid_chain(&chain));
    }
}
