//! MeshChain - a proof-of-work ledger replicated across HTTP peers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Chain storage, block receipt and chain validation
//! - [`transaction`] - Transaction types and validation
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work nonce search
//! - [`consensus`] - Gossip, mining orchestration and longest-chain reconciliation
//!
//! ## Cryptography
//! - [`crypto`] - Block digests (SHA-256)
//!
//! ## Networking & Integration
//! - [`network`] - Peer registry and HTTP transport
//! - `api` - HTTP endpoints (feature `api`)
//! - [`node`] - Startup orchestration
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

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

pub use blockchain::{Block, Blockchain, ChainSnapshot};
pub use consensus::ConsensusCoordinator;
pub use error::ChainError;
pub use network::{HttpTransport, PeerRegistry, PeerTransport};
pub use transaction::Transaction;
