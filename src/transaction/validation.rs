/// Validation of transaction submissions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::Transaction;
use serde::Deserialize;
use serde_json::Number;

/// A transaction submission as it arrives from a client.
///
/// Every field is optional at the wire level so a missing field is reported
/// as malformed input instead of a generic decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub amount: Option<Number>,
}

impl TransactionRequest {
    /// Checks that all three fields carry a value; an explicit `null` counts
    /// the same as an absent key. Values themselves are not inspected:
    /// amounts and addresses are taken as given.
    pub fn into_transaction(self) -> Result<Transaction, ChainError> {
        let missing: Vec<&str> = [
            ("sender", self.sender.is_none()),
            ("recipient", self.recipient.is_none()),
            ("amount", self.amount.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        match (self.sender, self.recipient, self.amount) {
            (Some(sender), Some(recipient), Some(amount)) => Ok(Transaction {
                sender,
                recipient,
                amount,
            }),
            _ => Err(ChainError::MalformedInput(format!(
                "Missing or null values: {}",
                missing.join(", ")
            ))),
        }
    }
}
