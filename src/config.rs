use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Index settings applied by the leader when it creates an index
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Number of documents an active segment accepts before it is sealed
    pub segment_capacity: usize,
    /// Case sensitivity used when a create request does not specify one
    pub case_sensitive: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            segment_capacity: 1_000,
            case_sensitive: false,
        }
    }
}

/// Node configuration for a Quarry cluster member
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub node_id: u64,
    /// Address used by Raft RPC
    pub raft_addr: String,
    /// Externally reachable HTTP address
    pub http_addr: String,
    pub data_dir: PathBuf,
    /// Directory used by the filesystem blob store
    pub blob_dir: PathBuf,
    /// Bootstrap a single-node cluster on first start
    pub bootstrap: bool,
    /// HTTP address of an existing member to join through
    pub join_addr: Option<String>,
    pub apply_timeout_ms: u64,
    pub search_workers: usize,
    pub snapshot_lag_threshold: u64,
    pub index_settings: IndexSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            raft_addr: "127.0.0.1:7001".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            blob_dir: PathBuf::from("./blobs"),
            bootstrap: false,
            join_addr: None,
            apply_timeout_ms: 10_000,
            search_workers: num_cpus::get(),
            snapshot_lag_threshold: 1_000,
            index_settings: IndexSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Create a new node configuration
    pub fn new(node_id: u64, raft_addr: String, http_addr: String, data_dir: PathBuf) -> Self {
        Self {
            node_id,
            raft_addr,
            http_addr,
            data_dir,
            ..Default::default()
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_join_addr(mut self, join_addr: Option<String>) -> Self {
        self.join_addr = join_addr;
        self
    }

    pub fn with_blob_dir(mut self, blob_dir: PathBuf) -> Self {
        self.blob_dir = blob_dir;
        self
    }

    pub fn with_segment_capacity(mut self, capacity: usize) -> Self {
        self.index_settings.segment_capacity = capacity.max(1);
        self
    }

    /// Set the number of search worker threads
    pub fn with_search_workers(mut self, workers: usize) -> Self {
        self.search_workers = workers.max(1);
        self
    }

    pub fn with_apply_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.apply_timeout_ms = timeout_ms;
        self
    }

    /// Set the snapshot lag threshold
    pub fn with_snapshot_lag_threshold(mut self, threshold: u64) -> Self {
        self.snapshot_lag_threshold = threshold;
        self
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    /// Get the Raft storage directory for this node
    pub fn raft_dir(&self) -> PathBuf {
        self.data_dir.join(format!("node{}", self.node_id))
    }
}
