#![forbid(unsafe_code)]
//! MeshChain node: serves the ledger over HTTP and joins the peer mesh.

use clap::Parser;
use meshchain::config::load_config;
use meshchain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "MeshChain proof-of-work ledger node")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides node.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// URL peers use to reach this node (overrides node.url)
    #[arg(long)]
    url: Option<String>,

    /// Additional bootstrap peer; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,

    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.node.port = port;
    }
    if let Some(url) = cli.url {
        config.node.url = Some(url);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .init();

    let node = Arc::new(Node::init(config)?);
    node.start().await?;
    Ok(())
}
