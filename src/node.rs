use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::crypto::generate_node_id;
use crate::error::ChainError;
use crate::miner::solve_with_timeout;
use crate::network::{Node as PeerNode, PeerRegistry};
use crate::sync::{ChainResolver, HttpChainFetcher, PeerChainFetcher, ResolverStats};
use crate::transaction::Transaction;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Syncing,
    Ready,
}

/// One running ledger node: the ledger, its peers, and the operations the
/// HTTP layer drives.
pub struct Node {
    pub config: Config,
    pub node_id: String,
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub peers: Arc<PeerRegistry>,
    pub resolver: ChainResolver,
    pub state: RwLock<NodeState>,
    solve_timeout: Duration,
    blocks_mined: AtomicU64,
    transactions_submitted: AtomicU64,
}

impl Node {
    /// Build a node that fetches peer chains over HTTP.
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let fetcher = Arc::new(HttpChainFetcher::new(config.fetch_timeout()?));
        Self::with_fetcher(config, fetcher)
    }

    /// Build a node around an explicit peer-chain fetcher.
    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn PeerChainFetcher>,
    ) -> Result<Self, ChainError> {
        let solve_timeout = config.solve_timeout()?;
        let node_id = if config.miner.node_id.trim().is_empty() {
            generate_node_id()
        } else {
            config.miner.node_id.trim().to_string()
        };

        let blockchain = Arc::new(RwLock::new(Blockchain::new()));
        let peers = Arc::new(PeerRegistry::new());
        let resolver = ChainResolver::new(blockchain.clone(), peers.clone(), fetcher);

        Ok(Self {
            config,
            node_id,
            blockchain,
            peers,
            resolver,
            state: RwLock::new(NodeState::Booting),
            solve_timeout,
            blocks_mined: AtomicU64::new(0),
            transactions_submitted: AtomicU64::new(0),
        })
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub fn transactions_submitted(&self) -> u64 {
        self.transactions_submitted.load(Ordering::Relaxed)
    }

    pub fn resolver_stats(&self) -> ResolverStats {
        self.resolver.stats()
    }

    async fn set_state(&self, state: NodeState) {
        *self.state.write().await = state;
    }

    /// Queue a transaction; returns the index of the block that will hold it.
    pub async fn submit_transaction(&self, transaction: Transaction) -> u64 {
        let index = self.blockchain.write().await.new_transaction(transaction);
        self.transactions_submitted.fetch_add(1, Ordering::Relaxed);
        index
    }

    /// Mine one block: solve against the current tip without holding the
    /// ledger lock, then pay the reward and seal under the write lock.
    ///
    /// If the tip moved while solving (a block was mined or the chain was
    /// replaced), the proof is stale and the search starts over.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        let timeout = self.solve_timeout;
        self.mine_with(|last_proof| solve_with_timeout(last_proof, timeout))
            .await
    }

    async fn mine_with<S, F>(&self, mut solve: S) -> Result<Block, ChainError>
    where
        S: FnMut(u64) -> F,
        F: Future<Output = Result<u64, ChainError>>,
    {
        loop {
            let last_block = self.blockchain.read().await.last_block().clone();
            let proof = solve(last_block.proof).await?;

            let mut blockchain = self.blockchain.write().await;
            if blockchain.last_block() != &last_block {
                debug!(
                    stale_index = last_block.index,
                    tip = blockchain.last_block().index,
                    "chain tip moved during proof search, retrying"
                );
                continue;
            }

            blockchain.new_transaction(Transaction::reward(self.node_id.clone()));
            let block = blockchain.new_block(proof, Some(last_block.hash()));
            self.blocks_mined.fetch_add(1, Ordering::Relaxed);
            return Ok(block);
        }
    }

    /// Register several peers at once. Every address is checked first, so a
    /// malformed entry leaves the registry untouched.
    pub fn register_nodes<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>, ChainError> {
        if addresses.is_empty() {
            return Err(ChainError::MalformedInput(
                "Please supply a valid list of nodes".to_string(),
            ));
        }
        for address in addresses {
            PeerNode::parse(address.as_ref())?;
        }
        addresses
            .iter()
            .map(|address| self.peers.register(address.as_ref()))
            .collect()
    }

    pub async fn resolve_conflicts(&self) -> bool {
        self.resolver.resolve_conflicts().await
    }

    pub async fn chain_snapshot(&self) -> Vec<Block> {
        self.blockchain.read().await.chain().to_vec()
    }

    /// Bring the node up: register bootstrap peers, optionally adopt the
    /// network's chain, then serve the API until shutdown.
    pub async fn start(self: Arc<Self>) -> Result<(), ChainError> {
        info!(node_id = %self.node_id, "Starting Proofchain node");

        for peer in &self.config.network.bootstrap_peers {
            if let Err(e) = self.peers.register(peer) {
                warn!(peer = %peer, error = %e, "ignoring bootstrap peer");
            }
        }

        if self.config.network.resolve_on_startup && !self.peers.is_empty() {
            self.set_state(NodeState::Syncing).await;
            let replaced = self.resolve_conflicts().await;
            info!(
                replaced,
                length = self.blockchain.read().await.len(),
                "initial conflict resolution finished"
            );
        }
        self.set_state(NodeState::Ready).await;

        let bind = format!("{}:{}", self.config.network.host, self.config.network.api_port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| ChainError::IoError(format!("API address {} unavailable: {}", bind, e)))?;

        Node::start_api(self, listener).await
    }

    #[cfg(feature = "api")]
    async fn start_api(node: Arc<Self>, listener: tokio::net::TcpListener) -> Result<(), ChainError> {
        let api_node = Arc::new(crate::api::ApiNode::new(node));
        crate::api::run_api_server(api_node, listener).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(_node: Arc<Self>, _listener: tokio::net::TcpListener) -> Result<(), ChainError> {
        Err(ChainError::ConfigError("API feature not enabled in this build".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ChainResponse, FetchError};
    use async_trait::async_trait;

    struct NoPeers;

    #[async_trait]
    impl PeerChainFetcher for NoPeers {
        async fn fetch_chain(&self, _peer: &str) -> Result<ChainResponse, FetchError> {
            Err(FetchError::Network("offline".to_string()))
        }
    }

    fn test_node() -> Node {
        let mut config = Config::default();
        config.miner.node_id = "node-a".to_string();
        Node::with_fetcher(config, Arc::new(NoPeers)).unwrap()
    }

    #[tokio::test]
    async fn test_mine_pays_reward_and_links() {
        let node = test_node();
        let index = node
            .submit_transaction(Transaction::new("alice", "bob", 4u64))
            .await;

        let block = node.mine().await.unwrap();
        assert_eq!(block.index, index);
        assert_eq!(block.proof, 35293);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1], Transaction::reward("node-a"));

        let chain = node.chain_snapshot().await;
        assert_eq!(block.previous_hash, chain[0].hash());
        assert!(node.blockchain.read().await.is_valid());
        assert_eq!(node.blocks_mined(), 1);
        assert_eq!(node.transactions_submitted(), 1);
    }

    #[tokio::test]
    async fn test_mine_restarts_when_tip_moves_during_search() {
        use crate::blockchain::valid_chain;
        use crate::miner::{proof_of_work, valid_proof};
        use std::sync::atomic::AtomicUsize;

        let node = test_node();
        let ledger = node.blockchain.clone();
        let searches = Arc::new(AtomicUsize::new(0));
        let counter = searches.clone();

        // The first search is overtaken by a competing block sealed mid-flight.
        let block = node
            .mine_with(move |last_proof| {
                let ledger = ledger.clone();
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        let mut bc = ledger.write().await;
                        let competing = proof_of_work(bc.last_block().proof);
                        bc.new_block(competing, None);
                    }
                    Ok::<u64, ChainError>(proof_of_work(last_proof))
                }
            })
            .await
            .unwrap();

        let chain = node.chain_snapshot().await;
        assert_eq!(searches.load(Ordering::SeqCst), 2);
        assert_eq!(chain.len(), 3);
        assert_eq!(block.index, 3);
        assert_eq!(block.previous_hash, chain[1].hash());
        assert!(valid_proof(chain[1].proof, block.proof));
        assert_eq!(block.transactions, vec![Transaction::reward("node-a")]);
        assert!(valid_chain(&chain));
        assert_eq!(node.blocks_mined(), 1);
    }

    #[tokio::test]
    async fn test_mine_restarts_when_chain_replaced_during_search() {
        use crate::blockchain::valid_chain;
        use crate::miner::proof_of_work;

        let mut longer = Blockchain::new();
        for _ in 0..3 {
            let proof = proof_of_work(longer.last_block().proof);
            longer.new_block(proof, None);
        }
        let adopted = longer.chain().to_vec();

        let node = test_node();
        let ledger = node.blockchain.clone();
        let mut replaced = false;
        let block = node
            .mine_with(move |last_proof| {
                let ledger = ledger.clone();
                let replacement = (!replaced).then(|| adopted.clone());
                replaced = true;
                async move {
                    if let Some(chain) = replacement {
                        ledger.write().await.replace_chain(chain).unwrap();
                    }
                    Ok::<u64, ChainError>(proof_of_work(last_proof))
                }
            })
            .await
            .unwrap();

        let chain = node.chain_snapshot().await;
        assert_eq!(chain.len(), 5);
        assert_eq!(block.index, 5);
        assert_eq!(block.previous_hash, chain[3].hash());
        assert!(valid_chain(&chain));
    }

    #[tokio::test]
    async fn test_generated_node_id_when_unset() {
        let node = Node::with_fetcher(Config::default(), Arc::new(NoPeers)).unwrap();
        assert_eq!(node.node_id.len(), 32);
    }

    #[tokio::test]
    async fn test_register_nodes_is_all_or_nothing() {
        let node = test_node();
        assert!(node.register_nodes(&["http://127.0.0.1:5001", "http://"]).is_err());
        assert!(node.peers.is_empty());

        let registered = node
            .register_nodes(&["http://127.0.0.1:5001", "127.0.0.1:5001", "10.0.0.9:5000"])
            .unwrap();
        assert_eq!(registered, vec!["127.0.0.1:5001", "127.0.0.1:5001", "10.0.0.9:5000"]);
        assert_eq!(node.peers.len(), 2);
    }

    #[tokio::test]
    async fn test_register_nodes_rejects_empty_list() {
        let node = test_node();
        let empty: [&str; 0] = [];
        assert!(matches!(
            node.register_nodes(&empty),
            Err(ChainError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peers_do_not_replace() {
        let node = test_node();
        node.register_nodes(&["127.0.0.1:1"]).unwrap();
        assert!(!node.resolve_conflicts().await);
        assert_eq!(node.resolver_stats().peers_skipped, 1);
    }
}
