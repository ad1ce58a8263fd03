pub mod api;
pub mod cluster;
pub mod config;
pub mod consensus;
pub mod error;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod search;
pub mod segment;
pub mod server;
pub mod state_machine;
pub mod tokenizer;

pub use api::{create_router, raft_router, AppState};
pub use cluster::ClusterService;
pub use config::{IndexSettings, NodeConfig};
pub use error::{QuarryError, Result};
pub use metrics::SearchMetrics;
pub use models::*;
pub use persistence::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use server::QuarryNode;
pub use state_machine::SearchStateMachine;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
