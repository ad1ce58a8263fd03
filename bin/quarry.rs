use anyhow::{Context, Result};
use clap::Parser;
use quarry::{FsBlobStore, IndexSettings, NodeConfig, QuarryNode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Replicated full-text search engine", long_about = None)]
struct Args {
    /// Node ID (must be unique in cluster)
    #[arg(long, env = "QUARRY_NODE_ID")]
    node_id: u64,

    /// Bind address for Raft RPC (inter-node communication)
    #[arg(long, env = "QUARRY_RAFT_ADDR", default_value = "127.0.0.1:7001")]
    raft_addr: String,

    /// Bind address for the HTTP API
    #[arg(long, env = "QUARRY_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Data directory for the Raft log and snapshots
    #[arg(long, env = "QUARRY_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Directory for document bodies, shared by all nodes
    #[arg(long, env = "QUARRY_BLOB_DIR", default_value = "./blobs")]
    blob_dir: PathBuf,

    /// Initialize a new cluster with this node as its only member
    #[arg(long, env = "QUARRY_BOOTSTRAP")]
    bootstrap: bool,

    /// HTTP address of an existing member to join through
    #[arg(long, env = "QUARRY_JOIN", conflicts_with = "bootstrap")]
    join: Option<String>,

    /// Documents per segment before it is sealed
    #[arg(long, env = "QUARRY_SEGMENT_CAPACITY", default_value = "1000")]
    segment_capacity: usize,

    /// Default case sensitivity for new indices
    #[arg(long, env = "QUARRY_CASE_SENSITIVE")]
    case_sensitive: bool,

    /// How long a write waits for its entry to be applied
    #[arg(long, env = "QUARRY_APPLY_TIMEOUT_MS", default_value = "10000")]
    apply_timeout_ms: u64,

    /// Search worker threads per query (defaults to CPU count)
    #[arg(long, env = "QUARRY_SEARCH_WORKERS")]
    search_workers: Option<usize>,

    /// Log entries since the last snapshot that trigger a new one
    #[arg(long, env = "QUARRY_SNAPSHOT_THRESHOLD", default_value = "1000")]
    snapshot_threshold: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting Quarry v{} - Node {}", quarry::VERSION, args.node_id);

    let mut config = NodeConfig::new(
        args.node_id,
        args.raft_addr.clone(),
        args.http_addr.clone(),
        args.data_dir.clone(),
    )
    .with_bootstrap(args.bootstrap)
    .with_join_addr(args.join.clone())
    .with_blob_dir(args.blob_dir.clone())
    .with_apply_timeout_ms(args.apply_timeout_ms)
    .with_snapshot_lag_threshold(args.snapshot_threshold);
    config.index_settings = IndexSettings {
        segment_capacity: args.segment_capacity.max(1),
        case_sensitive: args.case_sensitive,
    };
    if let Some(workers) = args.search_workers {
        config = config.with_search_workers(workers);
    }

    info!(
        raft_addr = %config.raft_addr,
        http_addr = %config.http_addr,
        data_dir = ?config.data_dir,
        blob_dir = ?config.blob_dir,
        bootstrap = config.bootstrap,
        join = ?config.join_addr,
        "Node configuration"
    );

    let blobs = Arc::new(
        FsBlobStore::open(&config.blob_dir)
            .with_context(|| format!("failed to open blob dir {:?}", config.blob_dir))?,
    );

    let node = QuarryNode::start(config, blobs)
        .await
        .context("failed to start node")?;

    node.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    Ok(())
}
