//! Proofchain - a proof-of-work ledger node that converges on the longest
//! valid chain among its peers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger, and chain validation
//! - [`transaction`] - Transaction types and submission checks
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work puzzle and cancellable search
//! - [`sync`] - Peer chain fetching and longest-valid-chain resolution
//!
//! ## Hashing
//! - [`crypto`] - SHA-256 helpers and node identifiers
//! - [`encoding`] - Canonical JSON used as hash input
//!
//! ## Networking & Integration
//! - [`network`] - Peer address normalization and the peer registry
//! - [`node`] - Node orchestration
//! - `api` - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;
pub mod sync;

// ============================================================================
// Hashing
// ============================================================================
pub mod crypto;
pub mod encoding;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
