//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::TransactionRequest;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;
    use serde_json::{json, Number};

    #[test]
    fn test_request_with_all_fields() {
        let req: TransactionRequest =
            serde_json::from_value(json!({"sender": "a", "recipient": "b", "amount": 5})).unwrap();
        let tx = req.into_transaction().unwrap();
        assert_eq!(tx, Transaction::new("a", "b", 5u64));
    }

    #[test]
    fn test_request_missing_amount() {
        let req: TransactionRequest =
            serde_json::from_value(json!({"sender": "a", "recipient": "b"})).unwrap();
        match req.into_transaction() {
            Err(ChainError::MalformedInput(msg)) => assert_eq!(msg, "Missing or null values: amount"),
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn test_request_null_amount_is_named() {
        let req: TransactionRequest =
            serde_json::from_value(json!({"sender": "a", "recipient": "b", "amount": null}))
                .unwrap();
        let err = req.into_transaction().unwrap_err();
        assert_eq!(err, ChainError::MalformedInput("Missing or null values: amount".to_string()));
    }

    #[test]
    fn test_request_missing_everything() {
        let err = TransactionRequest::default().into_transaction().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed input: Missing or null values: sender, recipient, amount"
        );
    }

    #[test]
    fn test_amount_kind_survives_serde() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":2.5}"#).unwrap();
        assert_eq!(tx.amount, Number::from_f64(2.5).unwrap());
        assert_eq!(serde_json::to_value(&tx).unwrap()["amount"], json!(2.5));
    }

    #[test]
    fn test_reward_transaction() {
        let tx = Transaction::reward("node-1");
        assert!(tx.is_reward());
        assert_eq!(tx.amount, Number::from(1u64));
        assert_eq!(tx.recipient, "node-1");
    }
}
