#![forbid(unsafe_code)]
//! Proofchain node: serves the ledger API and takes part in consensus.

use clap::Parser;
use proofchain::config::load_config;
use proofchain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `network.api_port`
    #[arg(long)]
    port: Option<u16>,

    /// Overrides `network.host`
    #[arg(long)]
    host: Option<String>,

    /// Extra peers to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    config.network.bootstrap_peers.extend(cli.peers);

    let node = Arc::new(Node::new(config)?);
    node.start().await?;

    Ok(())
}
