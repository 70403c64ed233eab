//! Error types for Proofchain

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    InvalidChain(String),
    MalformedInput(String),
    MiningTimeout,
    ConfigError(String),
    SerializationError(String),
    IoError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidChain(msg) => write!(f, "Invalid chain: {}", msg),
            ChainError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            ChainError::MiningTimeout => write!(f, "Proof search exceeded its deadline"),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
