use crate::crypto::sha256_hex;
use crate::encoding::canonical_string;
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};
use tracing::{debug, info};

/// Proof stored in the genesis block; the first mined proof is solved against it.
pub const GENESIS_PROOF: u64 = 100;
/// `previousHash` sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Seconds since the Unix epoch, sub-second precision.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Canonical JSON text of the block, the exact bytes that get hashed.
    pub fn canonical_json(&self) -> String {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(Transaction::canonical_value)
            .collect();

        canonical_string(&json!({
            "index": self.index,
            "previousHash": self.previous_hash,
            "proof": self.proof,
            "timestamp": self.timestamp,
            "transactions": transactions,
        }))
    }

    /// SHA-256 hex digest of [`Block::canonical_json`].
    pub fn hash(&self) -> String {
        sha256_hex(self.canonical_json().as_bytes())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Wall-clock time as fractional seconds since the Unix epoch.
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The node's ledger: sealed blocks plus the transactions waiting for the next one.
#[derive(Debug, Clone)]
pub struct Blockchain {
    // Never empty: seeded with genesis, and replace_chain refuses empty chains.
    chain: Vec<Block>,
    current_transactions: Vec<Transaction>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a ledger holding only a freshly stamped genesis block.
    pub fn new() -> Self {
        let mut blockchain = Blockchain {
            chain: Vec::new(),
            current_transactions: Vec::new(),
        };
        blockchain.push_block(GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string());
        blockchain
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.current_transactions
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Queue a transaction for the next block and return that block's index.
    pub fn new_transaction(&mut self, transaction: Transaction) -> u64 {
        debug!(
            sender = %transaction.sender,
            recipient = %transaction.recipient,
            amount = %transaction.amount,
            "queued transaction"
        );
        self.current_transactions.push(transaction);
        self.last_block().index + 1
    }

    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<Number>,
    ) -> u64 {
        self.new_transaction(Transaction::new(sender, recipient, amount))
    }

    /// Seal every pending transaction into a new block.
    ///
    /// `previous_hash` defaults to the hash of the current last block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| self.last_block().hash());
        let block = self.push_block(proof, previous_hash);
        info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "sealed block"
        );
        block
    }

    fn push_block(&mut self, proof: u64, previous_hash: String) -> Block {
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: current_timestamp(),
            transactions: std::mem::take(&mut self.current_transactions),
            proof,
            previous_hash,
        };
        self.chain.push(block.clone());
        block
    }

    /// Swap in a chain the caller has already validated. Pending transactions
    /// are left alone.
    pub fn replace_chain(&mut self, new_chain: Vec<Block>) -> Result<(), ChainError> {
        if new_chain.is_empty() {
            return Err(ChainError::InvalidChain(
                "Refusing to replace the local chain with an empty one".to_string(),
            ));
        }
        info!(
            old_length = self.chain.len(),
            new_length = new_chain.len(),
            "replacing local chain"
        );
        self.chain = new_chain;
        Ok(())
    }

    /// Self-check of the local chain.
    pub fn is_valid(&self) -> bool {
        super::validation::valid_chain(&self.chain)
    }
}
