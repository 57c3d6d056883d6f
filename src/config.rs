//! Configuration management for MeshChain

use crate::error::ChainError;
use crate::network::validate_peer_url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL peers use to reach this node. Derived from `port` when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Recipient of mining rewards. A random id is generated when unset.
    #[serde(default)]
    pub reward_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            url: None,
            reward_address: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bootstrap_peers: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// The URL this node advertises to peers.
    pub fn node_url(&self) -> String {
        match &self.node.url {
            Some(url) => crate::network::normalize_url(url),
            None => format!("http://127.0.0.1:{}", self.node.port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ChainError> {
        tracing::Level::from_str(&self.logging.level).map_err(|_| {
            ChainError::ConfigError(format!("Unknown log level {:?}", self.logging.level))
        })
    }

    /// Validate critical values
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.node.port == 0 {
            return Err(ChainError::ConfigError("node.port must be non-zero".to_string()));
        }

        if self.network.request_timeout_secs == 0 {
            return Err(ChainError::ConfigError(
                "network.request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        validate_peer_url(&self.node_url())
            .map_err(|e| ChainError::ConfigError(format!("node.url is invalid: {}", e)))?;

        for peer in &self.network.bootstrap_peers {
            validate_peer_url(peer).map_err(|e| {
                ChainError::ConfigError(format!("network.bootstrap_peers entry is invalid: {}", e))
            })?;
        }

        if let Some(address) = &self.node.reward_address {
            if address.trim().is_empty() {
                return Err(ChainError::ConfigError(
                    "node.reward_address cannot be empty".to_string(),
                ));
            }
        }

        self.log_level()?;
        Ok(())
    }
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let config_str = fs::read_to_string(path)?;
    parse_config(&config_str)
}

fn default_port() -> u16 {
    3001
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
