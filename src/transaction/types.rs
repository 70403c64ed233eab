/// Transaction types for Proofchain
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

/// Sender used for the block reward a miner pays itself.
pub const REWARD_SENDER: &str = "0";

/// A value transfer recorded in a block.
///
/// Transactions carry no identity beyond their fields; two equal transfers in
/// the same block are two transfers. `amount` keeps its JSON number kind so an
/// integer amount hashes as an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: Number,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: impl Into<Number>) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// The reward transaction appended by the mining entry point.
    pub fn reward(recipient: impl Into<String>) -> Self {
        Self::new(REWARD_SENDER, recipient, 1u64)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// JSON value fed to the canonical encoder when hashing the enclosing block.
    pub fn canonical_value(&self) -> Value {
        json!({
            "amount": self.amount,
            "recipient": self.recipient,
            "sender": self.sender,
        })
    }
}
