//! Integration tests for the MeshChain HTTP endpoints
//!
//! A single node with no peers is driven through the router, so every
//! broadcast is a no-op and the responses only reflect local state.

use axum_test::TestServer;
use meshchain::api::{build_api_router, ApiNode};
use meshchain::consensus::ConsensusCoordinator;
use meshchain::network::HttpTransport;
use meshchain::node::NodeState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const NODE_URL: &str = "http://127.0.0.1:4001";

fn test_server(state: NodeState) -> TestServer {
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(1)).expect("client"));
    let coordinator = Arc::new(ConsensusCoordinator::new(NODE_URL, "miner-address", transport));
    let api_node = Arc::new(ApiNode::with_state(coordinator, Arc::new(RwLock::new(state))));

    TestServer::new(build_api_router(api_node)).expect("Failed to create test server")
}

#[tokio::test]
async fn test_health_reflects_node_state() {
    let server = test_server(NodeState::Ready);
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["node_state"], "Ready");
    assert!(json["timestamp"].is_string());

    let server = test_server(NodeState::Joining);
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 503);
    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
}

#[tokio::test]
async fn test_blockchain_starts_at_genesis() {
    let server = test_server(NodeState::Ready);

    let response = server.get("/blockchain").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();

    let chain = json["chain"].as_array().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["index"], 1);
    assert_eq!(chain[0]["nonce"], 100);
    assert_eq!(chain[0]["hash"], "0");
    assert_eq!(chain[0]["previousBlockHash"], "0");
    assert_eq!(json["pendingTransactions"], json!([]));
    assert_eq!(json["currentNodeUrl"], NODE_URL);
    assert_eq!(json["networkNodes"], json!([]));
}

#[tokio::test]
async fn test_transaction_broadcast_then_mine() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/transaction/broadcast")
        .json(&json!({ "amount": 10.0, "sender": "alice", "recipient": "bob" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["blockIndex"], 2);
    assert_eq!(json["transaction"]["amount"], 10.0);
    assert_eq!(json["failedPeers"], json!([]));
    let transaction_id = json["transaction"]["transactionId"].as_str().unwrap().to_string();

    let response = server.get("/mine").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    let block = &json["block"];
    assert_eq!(block["index"], 2);
    assert_eq!(block["previousBlockHash"], "0");
    assert!(block["hash"].as_str().unwrap().starts_with("0000"));
    assert_eq!(block["transactions"][0]["transactionId"], transaction_id.as_str());
    let block_hash = block["hash"].as_str().unwrap().to_string();

    // The reward waits for the next block
    let json: Value = server.get("/blockchain").await.json();
    let pending = json["pendingTransactions"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["sender"], "00");
    assert_eq!(pending[0]["recipient"], "miner-address");
    assert_eq!(pending[0]["amount"], 12.5);

    // Explorer lookups
    let json: Value = server.get(&format!("/block/{}", block_hash)).await.json();
    assert_eq!(json["block"]["index"], 2);

    let json: Value = server.get(&format!("/transaction/{}", transaction_id)).await.json();
    assert_eq!(json["transaction"]["sender"], "alice");
    assert_eq!(json["block"]["hash"], block_hash.as_str());

    let json: Value = server.get("/address/bob").await.json();
    assert_eq!(json["addressData"]["addressBalance"], 10.0);
    assert_eq!(json["addressData"]["addressTransactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_lookups_for_unknown_items_return_null() {
    let server = test_server(NodeState::Ready);

    let json: Value = server.get("/block/does-not-exist").await.json();
    assert!(json["block"].is_null());

    let json: Value = server.get("/transaction/does-not-exist").await.json();
    assert!(json["transaction"].is_null());
    assert!(json["block"].is_null());

    let json: Value = server.get("/address/nobody").await.json();
    assert_eq!(json["addressData"]["addressBalance"], 0.0);
}

#[tokio::test]
async fn test_forwarded_transaction_is_queued() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/transaction")
        .json(&json!({
            "amount": 3.5,
            "sender": "carol",
            "recipient": "dave",
            "transactionId": "f00dfeed"
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["note"], "Transaction will be added in block 2.");

    let json: Value = server.get("/blockchain").await.json();
    assert_eq!(json["pendingTransactions"][0]["transactionId"], "f00dfeed");
}

#[tokio::test]
async fn test_malformed_transaction_is_bad_request() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/transaction/broadcast")
        .json(&json!({ "amount": -1.0, "sender": "alice", "recipient": "bob" }))
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("Malformed input"));
}

#[tokio::test]
async fn test_rejected_block_is_conflict() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/receive-new-block")
        .json(&json!({
            "newBlock": {
                "index": 5,
                "timestamp": 0,
                "transactions": [],
                "nonce": 1,
                "hash": "0000abc",
                "previousBlockHash": "0"
            }
        }))
        .await;
    assert_eq!(response.status_code(), 409);

    let json: Value = server.get("/blockchain").await.json();
    assert_eq!(json["chain"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_peer_registration_endpoints() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/register-node")
        .json(&json!({ "newNodeUrl": "http://127.0.0.1:4002" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["added"], true);

    let response = server
        .post("/register-node")
        .json(&json!({ "newNodeUrl": NODE_URL }))
        .await;
    let json: Value = response.json();
    assert_eq!(json["added"], false);

    let response = server
        .post("/register-node")
        .json(&json!({ "newNodeUrl": "not a url" }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .post("/register-nodes-bulk")
        .json(&json!({
            "allNetworkNodes": ["http://127.0.0.1:4002", "http://127.0.0.1:4003", NODE_URL, "bogus"]
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["added"], 1);

    let json: Value = server.get("/blockchain").await.json();
    assert_eq!(
        json["networkNodes"],
        json!(["http://127.0.0.1:4002", "http://127.0.0.1:4003"])
    );
}

#[tokio::test]
async fn test_register_and_broadcast_refuses_self() {
    let server = test_server(NodeState::Ready);

    let response = server
        .post("/register-and-broadcast-node")
        .json(&json!({ "newNodeUrl": NODE_URL }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_consensus_without_peers_keeps_chain() {
    let server = test_server(NodeState::Ready);

    let response = server.get("/consensus").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["note"], "Current chain has not been replaced.");
    assert_eq!(json["chain"].as_array().unwrap().len(), 1);
}
