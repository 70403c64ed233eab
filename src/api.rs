//! REST API for a Proofchain node
//!
//! Exposes mining, transaction submission, chain inspection and peer
//! management over HTTP. The payload shapes are wire-compatible with other
//! nodes speaking the same protocol, so `GET /chain` doubles as the
//! peer-fetch endpoint used during conflict resolution.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::node::Node;
use crate::sync::{ChainResponse, ResolverStats};
use crate::transaction::{Transaction, TransactionRequest};

/// HTTP-facing wrapper around a [`Node`], carrying request statistics.
pub struct ApiNode {
    pub node: Arc<Node>,
    api_stats: RwLock<ApiStats>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiNode {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            api_stats: RwLock::new(ApiStats::new()),
        }
    }

    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            uptime_seconds: uptime,
            blocks_mined: self.node.blocks_mined(),
            transactions_submitted: self.node.transactions_submitted(),
            chain_length: self.node.blockchain.read().await.len(),
            peers: self.node.peers.len(),
            consensus: self.node.resolver_stats(),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Timeout(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Timeout(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::MalformedInput(_) => ApiError::InvalidInput(err.to_string()),
            ChainError::MiningTimeout => ApiError::Timeout(err.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        MineResponse {
            message: "New block forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_chain: Option<Vec<Block>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<Block>>,
}

#[derive(Serialize)]
pub struct ValidityResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub count: usize,
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub uptime_seconds: u64,
    pub blocks_mined: u64,
    pub transactions_submitted: u64,
    pub chain_length: usize,
    pub peers: usize,
    pub consensus: ResolverStats,
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(api): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    api.api_stats.write().await.record_request(success);

    response
}

/// Logs method, path, status, duration and node state for every request.
async fn logging_middleware(
    State(api): State<Arc<ApiNode>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();
    let node_state = *api.node.state.read().await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        node_state = ?node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_api_router(api: Arc<ApiNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/chain/valid", get(chain_validity))
        // Peer endpoints
        .route("/nodes", get(list_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_conflicts))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing and node-state
        .layer(middleware::from_fn_with_state(api.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(api.clone(), stats_middleware))
        .with_state(api)
        .layer(cors)
}

/// Serve the API on an already-bound listener until the server stops.
pub async fn run_api_server(api: Arc<ApiNode>, listener: TcpListener) -> Result<(), ChainError> {
    let addr = listener.local_addr()?;
    let app = build_api_router(api);

    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(api): State<Arc<ApiNode>>) -> Result<Json<MineResponse>, ApiError> {
    let block = api.node.mine().await?;
    tracing::info!(index = block.index, proof = block.proof, "New block forged");
    Ok(Json(MineResponse::from(block)))
}

/// `POST /transactions/new`. Replies `Transaction will be added to Block <index>`
/// with a space before the index; nodes that print `Block<index>` exist, so
/// clients should read the index as the trailing digits.
async fn new_transaction(
    State(api): State<Arc<ApiNode>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = payload?;
    let transaction = request.into_transaction()?;
    let index = api.node.submit_transaction(transaction).await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn full_chain(State(api): State<Arc<ApiNode>>) -> Json<ChainResponse> {
    Json(ChainResponse::from_chain(api.node.chain_snapshot().await))
}

async fn chain_validity(State(api): State<Arc<ApiNode>>) -> Json<ValidityResponse> {
    let blockchain = api.node.blockchain.read().await;
    Json(ValidityResponse {
        valid: blockchain.is_valid(),
        length: blockchain.len(),
    })
}

async fn list_nodes(State(api): State<Arc<ApiNode>>) -> Json<PeersResponse> {
    let nodes: Vec<String> = api.node.peers.all().into_iter().collect();
    Json(PeersResponse {
        count: nodes.len(),
        nodes,
    })
}

async fn register_nodes(
    State(api): State<Arc<ApiNode>>,
    payload: Result<Json<RegisterNodesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterNodesResponse>), ApiError> {
    let Json(request) = payload?;
    let nodes = request.nodes.ok_or_else(|| {
        ApiError::InvalidInput("Error: Please supply a valid list of nodes".to_string())
    })?;
    api.node.register_nodes(nodes.as_slice())?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: api.node.peers.all().into_iter().collect(),
        }),
    ))
}

async fn resolve_conflicts(State(api): State<Arc<ApiNode>>) -> Json<ResolveResponse> {
    let replaced = api.node.resolve_conflicts().await;
    let chain = api.node.chain_snapshot().await;

    let response = if replaced {
        ResolveResponse {
            message: "Chain has been replaced".to_string(),
            new_chain: Some(chain),
            chain: None,
        }
    } else {
        ResolveResponse {
            message: "Chain is the authority so does not need replacing".to_string(),
            new_chain: None,
            chain: Some(chain),
        }
    };
    Json(response)
}

async fn health_check(State(api): State<Arc<ApiNode>>) -> impl IntoResponse {
    let state = *api.node.state.read().await;
    let length = api.node.blockchain.read().await.len();

    Json(serde_json::json!({
        "status": "healthy",
        "node_id": api.node.node_id,
        "node_state": format!("{:?}", state),
        "length": length,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_api_stats(State(api): State<Arc<ApiNode>>) -> Json<ApiStatsResponse> {
    Json(api.get_stats().await)
}
