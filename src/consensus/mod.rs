//! Consensus module - OpenRaft-based replication
//!
//! Commands are replicated through OpenRaft; peers talk to each other with
//! JSON over HTTP on a listener of their own, apart from the client API.

pub mod network;
pub mod node;
pub mod storage;
pub mod types;

pub use network::{HttpNetwork, RAFT_APPEND_PATH, RAFT_SNAPSHOT_PATH, RAFT_VOTE_PATH};
pub use node::{ClusterMembership, QuarryRaft, RaftNode};
pub use storage::{LogStore, StateMachineStore};
pub use types::{NodeId, QuarryLogId, TypeConfig};
