//! # Chunkcast CLI Entry Point
//!
//! Main binary for a chunkcast overlay node.
//!
//! ## Usage
//!
//! ```bash
//! # Start a root node serving synthetic data
//! chunkcast --name root --port 9000
//!
//! # Start a root node serving a video directory
//! chunkcast --name root --port 9000 --video-dir /srv/videos
//!
//! # Start a mid-tree relay with a master and a standby supermaster
//! chunkcast --name relay-1 --port 9001 \
//!     --master-port 9000 --supermaster-port 9010
//! ```
//!
//! A node with a master is a mid-tree relay: it registers upstream, caches
//! chunks, and sequences ordered pulls from its children. A node without
//! one is a root serving straight from its video store (or synthetic test
//! data when no directory is given).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;
use chunkcast_node::{Node, NodeConfig};

/// A node in the chunkcast overlay network
#[derive(FromArgs)]
struct Cli {
    /// this node's name, unique within the tree
    #[argh(option, short = 'n')]
    name: String,

    /// port to bind the RPC server to
    #[argh(option, short = 'p')]
    port: u16,

    /// address advertised to the master for callbacks
    ///
    /// Defaults to 127.0.0.1:<port>. Set this when the master reaches this
    /// node over a non-loopback interface.
    #[argh(option)]
    public_addr: Option<String>,

    /// optionally specify the master's port (local host)
    #[argh(option)]
    master_port: Option<u16>,

    /// master address, overrides --master-port for non-local masters
    #[argh(option)]
    master_addr: Option<String>,

    /// optionally specify your master's master (standby) port
    #[argh(option)]
    supermaster_port: Option<u16>,

    /// supermaster address, overrides --supermaster-port
    #[argh(option)]
    supermaster_addr: Option<String>,

    /// directory to use as the video database for masterless nodes
    #[argh(option)]
    video_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = NodeConfig::new(&cli.name, cli.port);
    config.public_addr = cli.public_addr;
    config.master_addr = cli
        .master_addr
        .or_else(|| cli.master_port.map(|p| format!("127.0.0.1:{}", p)));
    config.supermaster_addr = cli
        .supermaster_addr
        .or_else(|| cli.supermaster_port.map(|p| format!("127.0.0.1:{}", p)));
    config.video_dir = cli.video_dir;

    match (&config.master_addr, &config.video_dir) {
        (Some(master), _) => {
            tracing::info!("Starting relay node {} with master {}", cli.name, master)
        }
        (None, Some(dir)) => tracing::info!(
            "Starting root node {} serving {}",
            cli.name,
            dir.display()
        ),
        (None, None) => tracing::info!("Starting root node {} with synthetic data", cli.name),
    }
    if config.supermaster_addr.is_some() && config.master_addr.is_none() {
        tracing::warn!("--supermaster-* has no effect without a master");
    }

    let node = Arc::new(Node::start(config)?);
    node.serve().await?;

    Ok(())
}
