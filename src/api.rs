//! HTTP API for MeshChain
//!
//! Exposes the ledger to clients and the peer protocol endpoints to other
//! nodes. Every handler is a thin wrapper around [`ConsensusCoordinator`].

use axum::{
    extract::{Path, Request, State},
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
use crate::consensus::ConsensusCoordinator;
use crate::error::ChainError;
use crate::network::{
    PeerFailure, BLOCKCHAIN_PATH, CONSENSUS_PATH, MINE_PATH, RECEIVE_BLOCK_PATH,
    REGISTER_AND_BROADCAST_PATH, REGISTER_NODES_BULK_PATH, REGISTER_NODE_PATH,
    TRANSACTION_BROADCAST_PATH, TRANSACTION_PATH,
};
use crate::node::NodeState;
use crate::transaction::Transaction;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiNode {
    pub coordinator: Arc<ConsensusCoordinator>,
    // Optional orchestrator state for health checks and request logging
    pub state: Option<Arc<RwLock<NodeState>>>,
}

impl ApiNode {
    pub fn with_state(coordinator: Arc<ConsensusCoordinator>, state: Arc<RwLock<NodeState>>) -> Self {
        Self {
            coordinator,
            state: Some(state),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match &e {
                    ChainError::MalformedInput(_) => StatusCode::BAD_REQUEST,
                    ChainError::ChainInconsistency(_) => StatusCode::CONFLICT,
                    ChainError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: f64,
    pub sender: String,
    pub recipient: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNodeRequest {
    pub new_node_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkNodesRequest {
    pub all_network_nodes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockRequest {
    pub new_block: Block,
}

#[derive(Serialize)]
struct NoteResponse {
    note: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBroadcastResponse {
    note: String,
    transaction: Transaction,
    block_index: u64,
    failed_peers: Vec<PeerFailure>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MineResponse {
    note: String,
    block: Block,
    failed_peers: Vec<PeerFailure>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveBlockResponse {
    note: String,
    new_block: Block,
}

#[derive(Serialize)]
struct RegisterResponse {
    note: String,
    added: bool,
}

#[derive(Serialize)]
struct BulkRegisterResponse {
    note: String,
    added: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsensusResponse {
    note: String,
    chain: Vec<Block>,
    unreachable_peers: Vec<PeerFailure>,
}

#[derive(Serialize)]
struct BlockResponse {
    block: Option<Block>,
}

#[derive(Serialize)]
struct TransactionResponse {
    transaction: Option<Transaction>,
    block: Option<Block>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Detailed request logging middleware. Logs method, path, status, duration
/// and current `NodeState` (when available).
async fn logging_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    let node_state = if let Some(s) = &node.state {
        format!("{:?}", *s.read().await)
    } else {
        "unknown".to_string()
    };

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        node_state = %node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<ApiNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route(BLOCKCHAIN_PATH, get(get_blockchain))
        .route(TRANSACTION_PATH, post(receive_transaction))
        .route(TRANSACTION_BROADCAST_PATH, post(broadcast_transaction))
        .route(MINE_PATH, get(mine))
        .route(RECEIVE_BLOCK_PATH, post(receive_new_block))
        // Network endpoints
        .route(REGISTER_AND_BROADCAST_PATH, post(register_and_broadcast_node))
        .route(REGISTER_NODE_PATH, post(register_node))
        .route(REGISTER_NODES_BULK_PATH, post(register_nodes_bulk))
        .route(CONSENSUS_PATH, get(consensus))
        // Explorer endpoints
        .route("/block/:block_hash", get(get_block))
        .route("/transaction/:transaction_id", get(get_transaction))
        .route("/address/:address", get(get_address))
        // System endpoints
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on an already bound listener until `shutdown` resolves.
pub async fn run_api_server<F>(
    node: Arc<ApiNode>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ChainError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(node);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "API server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let state = match &node.state {
        Some(s) => s.read().await.clone(),
        // No orchestrator state available; assume ready
        None => NodeState::Ready,
    };

    let status = if state == NodeState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
            "node_state": format!("{:?}", state),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_blockchain(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(node.coordinator.get_chain().await)
}

async fn receive_transaction(
    State(node): State<Arc<ApiNode>>,
    Json(tx): Json<Transaction>,
) -> Result<Json<NoteResponse>, ApiError> {
    let block_index = node.coordinator.queue_transaction(tx).await?;
    Ok(Json(NoteResponse {
        note: format!("Transaction will be added in block {}.", block_index),
    }))
}

async fn broadcast_transaction(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionBroadcastResponse>, ApiError> {
    let outcome = node
        .coordinator
        .create_and_broadcast_transaction(req.amount, &req.sender, &req.recipient)
        .await?;

    Ok(Json(TransactionBroadcastResponse {
        note: "Transaction created and broadcast successfully.".to_string(),
        transaction: outcome.transaction,
        block_index: outcome.block_index,
        failed_peers: outcome.report.failed,
    }))
}

async fn mine(State(node): State<Arc<ApiNode>>) -> Result<Json<MineResponse>, ApiError> {
    let outcome = node.coordinator.mine().await?;

    let mut failed_peers = outcome.block_broadcast.failed;
    failed_peers.extend(outcome.reward.report.failed);

    Ok(Json(MineResponse {
        note: "New block mined & broadcast successfully".to_string(),
        block: outcome.block,
        failed_peers,
    }))
}

async fn receive_new_block(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<NewBlockRequest>,
) -> Result<Json<ReceiveBlockResponse>, ApiError> {
    node.coordinator.receive_block(req.new_block.clone()).await?;
    Ok(Json(ReceiveBlockResponse {
        note: "New block received and accepted.".to_string(),
        new_block: req.new_block,
    }))
}

async fn register_and_broadcast_node(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<NewNodeRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let outcome = node
        .coordinator
        .register_and_broadcast(&req.new_node_url)
        .await?;
    Ok(Json(RegisterResponse {
        note: "New node registered with network successfully.".to_string(),
        added: outcome.added,
    }))
}

async fn register_node(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<NewNodeRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let added = node.coordinator.register_peer(&req.new_node_url).await?;
    Ok(Json(RegisterResponse {
        note: "New node registered successfully.".to_string(),
        added,
    }))
}

async fn register_nodes_bulk(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<BulkNodesRequest>,
) -> impl IntoResponse {
    let added = node
        .coordinator
        .register_peers_bulk(&req.all_network_nodes)
        .await;
    Json(BulkRegisterResponse {
        note: "Bulk registration successful.".to_string(),
        added,
    })
}

async fn consensus(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let outcome = node.coordinator.reconcile().await;
    let note = if outcome.replaced {
        "This chain has been replaced."
    } else {
        "Current chain has not been replaced."
    };
    let chain = node.coordinator.get_chain().await.chain;

    Json(ConsensusResponse {
        note: note.to_string(),
        chain,
        unreachable_peers: outcome.unreachable,
    })
}

async fn get_block(
    State(node): State<Arc<ApiNode>>,
    Path(block_hash): Path<String>,
) -> impl IntoResponse {
    Json(BlockResponse {
        block: node.coordinator.find_block(&block_hash).await,
    })
}

async fn get_transaction(
    State(node): State<Arc<ApiNode>>,
    Path(transaction_id): Path<String>,
) -> impl IntoResponse {
    let (transaction, block) = match node.coordinator.find_transaction(&transaction_id).await {
        Some((tx, block)) => (Some(tx), Some(block)),
        None => (None, None),
    };
    Json(TransactionResponse { transaction, block })
}

async fn get_address(
    State(node): State<Arc<ApiNode>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if address.trim().is_empty() {
        return Err(ApiError::InvalidInput("Address cannot be empty".to_string()));
    }

    let data = node.coordinator.address_data(&address).await;
    Ok(Json(serde_json::json!({ "addressData": data })))
}
