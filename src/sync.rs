//! Chain synchronization for Proofchain
//!
//! Conflict resolution follows the longest-valid-chain rule:
//! - every registered peer is asked for its full chain (concurrently, each
//!   request under a timeout)
//! - a peer that fails, times out or sends garbage is skipped
//! - a candidate must be strictly longer than the local chain and pass
//!   [`validate_chain`]; the longest such candidate wins
//! - the swap happens under the ledger write lock after re-checking the local
//!   length, so a chain that grew meanwhile is never shortened
//!
//! Candidate length is always recomputed from the payload; the `length` a peer
//! reports is only compared for logging.

use crate::blockchain::{validate_chain, Block, Blockchain};
use crate::error::ChainError;
use crate::network::PeerRegistry;
use async_trait::async_trait;
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::{Client, Uri};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Why a single peer produced no candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Peer answered with HTTP status {0}")]
    Status(u16),
    #[error("Malformed chain payload: {0}")]
    Malformed(String),
}

/// Body of `GET /chain`, served by every node and consumed during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: u64,
}

impl ChainResponse {
    pub fn from_chain(chain: Vec<Block>) -> Self {
        let length = chain.len() as u64;
        Self { chain, length }
    }
}

/// Capability to fetch a peer's current chain, given its `host[:port]`.
#[async_trait]
pub trait PeerChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError>;
}

/// Largest `GET /chain` body accepted from a peer.
pub const DEFAULT_MAX_CHAIN_BYTES: usize = 64 * 1024 * 1024;

/// Fetches `http://<peer>/chain` with hyper.
pub struct HttpChainFetcher {
    client: Client<HttpConnector>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            max_body_bytes: DEFAULT_MAX_CHAIN_BYTES,
        }
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn oversized(&self) -> FetchError {
        FetchError::Malformed(format!(
            "chain payload exceeds {} bytes",
            self.max_body_bytes
        ))
    }

    async fn request(&self, uri: Uri) -> Result<ChainResponse, FetchError> {
        let response = self
            .client
            .get(uri)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let declared = response
            .headers()
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_body_bytes as u64) {
            return Err(self.oversized());
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = response.into_body();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
            if bytes.len() + chunk.len() > self.max_body_bytes {
                return Err(self.oversized());
            }
            bytes.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PeerChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        let uri: Uri = format!("http://{}/chain", peer)
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| FetchError::Network(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.request(uri))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}

/// What one peer contributed to a resolution round.
#[derive(Debug)]
enum PeerOutcome {
    Unavailable(FetchError),
    NotLonger(usize),
    Rejected(ChainError),
    Candidate(Vec<Block>),
}

/// Running totals, exposed through the node's stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub resolutions: u64,
    pub replacements: u64,
    pub peers_skipped: u64,
    pub candidates_rejected: u64,
}

/// Longest-valid-chain conflict resolver.
pub struct ChainResolver {
    blockchain: Arc<RwLock<Blockchain>>,
    peers: Arc<PeerRegistry>,
    fetcher: Arc<dyn PeerChainFetcher>,
    resolutions: AtomicU64,
    replacements: AtomicU64,
    peers_skipped: AtomicU64,
    candidates_rejected: AtomicU64,
}

impl ChainResolver {
    pub fn new(
        blockchain: Arc<RwLock<Blockchain>>,
        peers: Arc<PeerRegistry>,
        fetcher: Arc<dyn PeerChainFetcher>,
    ) -> Self {
        Self {
            blockchain,
            peers,
            fetcher,
            resolutions: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
            peers_skipped: AtomicU64::new(0),
            candidates_rejected: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            peers_skipped: self.peers_skipped.load(Ordering::Relaxed),
            candidates_rejected: self.candidates_rejected.load(Ordering::Relaxed),
        }
    }

    /// Consult every registered peer and adopt the longest valid chain that is
    /// strictly longer than ours. Returns true iff the local chain was replaced.
    pub async fn resolve_conflicts(&self) -> bool {
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        let local_length = self.blockchain.read().await.len();
        let peers = self.peers.all();
        info!(peers = peers.len(), local_length, "resolving conflicts");

        let mut tasks = JoinSet::new();
        for peer in peers {
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                let outcome = Self::evaluate_peer(fetcher.as_ref(), &peer, local_length).await;
                (peer, outcome)
            });
        }

        let mut best: Option<Vec<Block>> = None;
        while let Some(joined) = tasks.join_next().await {
            let (peer, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "peer task failed");
                    self.peers_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            match outcome {
                PeerOutcome::Unavailable(e) => {
                    warn!(peer = %peer, error = %e, "peer unavailable, skipping");
                    self.peers_skipped.fetch_add(1, Ordering::Relaxed);
                }
                PeerOutcome::NotLonger(length) => {
                    debug!(peer = %peer, length, local_length, "peer chain is not longer");
                }
                PeerOutcome::Rejected(e) => {
                    warn!(peer = %peer, error = %e, "rejected invalid candidate chain");
                    self.candidates_rejected.fetch_add(1, Ordering::Relaxed);
                }
                PeerOutcome::Candidate(chain) => {
                    let current_best = best.as_ref().map_or(local_length, Vec::len);
                    if chain.len() > current_best {
                        debug!(peer = %peer, length = chain.len(), "new best candidate");
                        best = Some(chain);
                    }
                }
            }
        }

        let Some(candidate) = best else {
            info!(local_length, "local chain is authoritative");
            return false;
        };

        let mut blockchain = self.blockchain.write().await;
        if candidate.len() <= blockchain.len() {
            info!(
                candidate = candidate.len(),
                local_length = blockchain.len(),
                "local chain grew during resolution, keeping it"
            );
            return false;
        }
        match blockchain.replace_chain(candidate) {
            Ok(()) => {
                self.replacements.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to replace chain");
                false
            }
        }
    }

    async fn evaluate_peer(
        fetcher: &dyn PeerChainFetcher,
        peer: &str,
        local_length: usize,
    ) -> PeerOutcome {
        let response = match fetcher.fetch_chain(peer).await {
            Ok(response) => response,
            Err(e) => return PeerOutcome::Unavailable(e),
        };

        let length = response.chain.len();
        if response.length != length as u64 {
            warn!(
                peer = %peer,
                reported = response.length,
                actual = length,
                "peer misreported its chain length, using the actual length"
            );
        }
        if length <= local_length {
            return PeerOutcome::NotLonger(length);
        }
        match validate_chain(&response.chain) {
            Ok(()) => PeerOutcome::Candidate(response.chain),
            Err(e) => PeerOutcome::Rejected(e),
        }
    }
}
