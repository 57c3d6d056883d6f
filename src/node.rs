//! Node orchestration: wires config, transport, coordinator and API together.

use crate::config::Config;
use crate::consensus::ConsensusCoordinator;
use crate::error::ChainError;
use crate::network::{HttpTransport, PeerTransport, REGISTER_AND_BROADCAST_PATH};
use crate::transaction::new_transaction_id;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    /// Announcing itself to bootstrap peers and catching up on their chains.
    Joining,
    Ready,
}

pub struct Node {
    pub config: Config,
    pub coordinator: Arc<ConsensusCoordinator>,
    pub transport: Arc<dyn PeerTransport>,
    pub state: Arc<RwLock<NodeState>>,
}

impl Node {
    pub fn init(config: Config) -> Result<Self, ChainError> {
        config.validate()?;

        let node_url = config.node_url();
        let reward_address = config
            .node
            .reward_address
            .clone()
            .unwrap_or_else(new_transaction_id);

        info!(url = %node_url, reward_address = %reward_address, "Initializing MeshChain node");

        let transport: Arc<dyn PeerTransport> = Arc::new(HttpTransport::new(config.request_timeout())?);
        let coordinator = Arc::new(ConsensusCoordinator::new(
            &node_url,
            reward_address,
            transport.clone(),
        ));

        Ok(Self {
            config,
            coordinator,
            transport,
            state: Arc::new(RwLock::new(NodeState::Booting)),
        })
    }

    async fn set_state(&self, state: NodeState) {
        info!(?state, "Node state changed");
        *self.state.write().await = state;
    }

    /// Announce this node to every bootstrap peer. Failures are logged and
    /// skipped so that one dead peer does not keep the node from starting.
    pub async fn join_network(&self) -> usize {
        let own_url = self.coordinator.current_node_url().await;
        let mut joined = 0;

        for peer in &self.config.network.bootstrap_peers {
            let body = json!({ "newNodeUrl": own_url });
            match self
                .transport
                .post(peer, REGISTER_AND_BROADCAST_PATH, body)
                .await
            {
                Ok(_) => {
                    info!(%peer, "Joined network through bootstrap peer");
                    joined += 1;
                }
                Err(e) => warn!(%peer, error = %e, "Bootstrap peer did not accept registration"),
            }
        }

        joined
    }

    pub async fn start(self: Arc<Self>) -> Result<(), ChainError> {
        // 1) Bind the API port first; bootstrap peers call back into it while
        //    we are joining.
        let port = self.config.node.port;
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| ChainError::ConfigError(format!("Port {} unavailable: {}", port, e)))?;

        let node = self.clone();
        let api_task = tokio::spawn(async move { Node::start_api(node, listener).await });

        // 2) Join the mesh and catch up
        self.set_state(NodeState::Joining).await;
        if !self.config.network.bootstrap_peers.is_empty() {
            let joined = self.join_network().await;
            info!(joined, total = self.config.network.bootstrap_peers.len(), "Bootstrap complete");

            let outcome = self.coordinator.reconcile().await;
            info!(
                replaced = outcome.replaced,
                chain_length = outcome.chain_length,
                "Initial consensus pass finished"
            );
        }

        // 3) Serve
        self.set_state(NodeState::Ready).await;

        match api_task.await {
            Ok(result) => result,
            Err(e) => {
                error!("API task aborted: {}", e);
                Err(ChainError::InternalError(e.to_string()))
            }
        }
    }

    #[cfg(feature = "api")]
    async fn start_api(node: Arc<Self>, listener: tokio::net::TcpListener) -> Result<(), ChainError> {
        let api_node = Arc::new(crate::api::ApiNode::with_state(
            node.coordinator.clone(),
            node.state.clone(),
        ));

        crate::api::run_api_server(api_node, listener, shutdown_signal()).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(_node: Arc<Self>, _listener: tokio::net::TcpListener) -> Result<(), ChainError> {
        Err(ChainError::ConfigError(
            "API feature not enabled in this build".to_string(),
        ))
    }
}

#[cfg(feature = "api")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
