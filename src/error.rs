//! Error types for MeshChain

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// A transaction or block is missing fields or carries invalid values.
    MalformedInput(String),
    /// A block or chain does not line up with the local tip or fails validation.
    ChainInconsistency(String),
    /// A single outbound call to a peer failed.
    PeerUnreachable { peer: String, reason: String },
    /// The chain has no blocks at all, which means genesis was never created.
    EmptyChain,
    ConfigError(String),
    IoError(String),
    SerializationError(String),
    InternalError(String),
}

impl ChainError {
    pub fn peer_unreachable(peer: impl Into<String>, reason: impl ToString) -> Self {
        ChainError::PeerUnreachable {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            ChainError::ChainInconsistency(msg) => write!(f, "Chain inconsistency: {}", msg),
            ChainError::PeerUnreachable { peer, reason } => {
                write!(f, "Peer {} unreachable: {}", peer, reason)
            }
            ChainError::EmptyChain => write!(f, "Chain is empty; genesis block is missing"),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::InternalError(msg) => write!(f, "Internal error: {}", msg),
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

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
