use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use openraft::error::{CheckIsLeaderError, ClientWriteError, InitializeError, RaftError};
use openraft::{BasicNode, ChangeMembers, Config, Raft, ServerState, SnapshotPolicy};
use tracing::info;

use super::network::HttpNetwork;
use super::storage::{LogStore, StateMachineStore};
use super::types::{NodeId, TypeConfig};
use crate::config::NodeConfig;
use crate::error::{QuarryError, Result};
use crate::models::{Command, CommandResponse};
use crate::state_machine::SearchStateMachine;

/// Alias for the Raft type with our configuration
pub type QuarryRaft = Raft<TypeConfig>;

/// Cluster membership as seen by this node
#[derive(Clone, Debug, Default)]
pub struct ClusterMembership {
    pub voters: Vec<NodeId>,
    pub learners: Vec<NodeId>,
    /// Raft address of every member
    pub nodes: BTreeMap<NodeId, String>,
}

/// Raft node wrapping the openraft handle
#[derive(Clone)]
pub struct RaftNode {
    raft: QuarryRaft,
    node_id: NodeId,
    raft_addr: String,
    apply_timeout: Duration,
}

impl RaftNode {
    /// Open storage and start the Raft core. Does not bootstrap.
    pub async fn start(config: &NodeConfig, machine: Arc<SearchStateMachine>) -> Result<Self> {
        let raft_config = Config {
            cluster_name: "quarry".to_string(),
            heartbeat_interval: 500,
            election_timeout_min: 1500,
            election_timeout_max: 3000,
            snapshot_policy: SnapshotPolicy::LogsSinceLast(config.snapshot_lag_threshold),
            max_in_snapshot_log_to_keep: 1000,
            ..Default::default()
        };
        let raft_config = Arc::new(
            raft_config
                .validate()
                .map_err(|e| QuarryError::Internal(format!("invalid raft config: {}", e)))?,
        );

        let data_dir = config.raft_dir();
        let log_store = LogStore::open(&data_dir)?;
        let sm_store = StateMachineStore::open(&data_dir, machine)?;

        let raft = Raft::new(
            config.node_id,
            raft_config,
            HttpNetwork::new(),
            log_store,
            sm_store,
        )
        .await
        .map_err(|e| QuarryError::Internal(format!("failed to create raft: {}", e)))?;

        Ok(Self {
            raft,
            node_id: config.node_id,
            raft_addr: config.raft_addr.clone(),
            apply_timeout: config.apply_timeout(),
        })
    }

    /// Initialize a single-voter cluster made of this node.
    ///
    /// Returns false when the node was already initialized.
    pub async fn initialize(&self) -> Result<bool> {
        let mut members = BTreeMap::new();
        members.insert(
            self.node_id,
            BasicNode {
                addr: self.raft_addr.clone(),
            },
        );

        match self.raft.initialize(members).await {
            Ok(()) => {
                info!(node_id = self.node_id, "Bootstrapped cluster");
                Ok(true)
            }
            Err(RaftError::APIError(InitializeError::NotAllowed(_))) => {
                info!(node_id = self.node_id, "Cluster already initialized");
                Ok(false)
            }
            Err(e) => Err(QuarryError::Consensus(format!(
                "failed to initialize cluster: {}",
                e
            ))),
        }
    }

    /// Replicate a command and wait for it to be applied locally.
    ///
    /// Gives up after the apply timeout; the command may still commit.
    pub async fn propose(&self, cmd: Command) -> Result<CommandResponse> {
        let name = cmd.name();
        let write = tokio::time::timeout(self.apply_timeout, self.raft.client_write(cmd)).await;
        match write {
            Err(_) => Err(QuarryError::ApplyTimeout(
                self.apply_timeout.as_millis() as u64,
            )),
            Ok(Ok(resp)) => Ok(resp.data),
            Ok(Err(RaftError::APIError(ClientWriteError::ForwardToLeader(_)))) => {
                Err(QuarryError::NotLeader)
            }
            Ok(Err(e)) => Err(QuarryError::Consensus(format!("{} failed: {}", name, e))),
        }
    }

    /// Confirm leadership with a quorum and wait until everything committed
    /// before that point has been applied locally.
    pub async fn ensure_linearizable(&self) -> Result<()> {
        let read = tokio::time::timeout(self.apply_timeout, self.raft.ensure_linearizable()).await;
        match read {
            Err(_) => Err(QuarryError::ApplyTimeout(
                self.apply_timeout.as_millis() as u64,
            )),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(RaftError::APIError(CheckIsLeaderError::ForwardToLeader(_)))) => {
                Err(QuarryError::NotLeader)
            }
            Ok(Err(e)) => Err(QuarryError::Consensus(format!(
                "leadership check failed: {}",
                e
            ))),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node_id
    }

    pub fn raft_addr(&self) -> &str {
        &self.raft_addr
    }

    pub fn raft(&self) -> &QuarryRaft {
        &self.raft
    }

    pub fn is_leader(&self) -> bool {
        let metrics = self.raft.metrics().borrow().clone();
        matches!(metrics.state, ServerState::Leader)
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.raft.metrics().borrow().current_leader
    }

    pub fn membership(&self) -> ClusterMembership {
        let metrics = self.raft.metrics().borrow().clone();
        let membership = metrics.membership_config.membership();

        ClusterMembership {
            voters: membership.voter_ids().collect(),
            learners: membership.learner_ids().collect(),
            nodes: membership
                .nodes()
                .map(|(id, node)| (*id, node.addr.clone()))
                .collect(),
        }
    }

    /// Raft address of a member
    pub fn node_address(&self, node_id: NodeId) -> Option<String> {
        self.membership().nodes.remove(&node_id)
    }

    /// Wait until some node is known to lead the cluster
    pub async fn wait_for_leader(&self, timeout: Duration) -> Result<NodeId> {
        let metrics = self
            .raft
            .wait(Some(timeout))
            .metrics(|m| m.current_leader.is_some(), "leader elected")
            .await
            .map_err(|e| QuarryError::Consensus(e.to_string()))?;
        metrics.current_leader.ok_or(QuarryError::NoLeaderDetected)
    }

    /// Wait until this node itself is the leader
    pub async fn wait_until_leader(&self, timeout: Duration) -> Result<()> {
        self.raft
            .wait(Some(timeout))
            .state(ServerState::Leader, "become leader")
            .await
            .map_err(|e| QuarryError::Consensus(e.to_string()))?;
        Ok(())
    }

    /// Add a node as learner, then promote it to voter (must be leader)
    pub async fn add_voter(&self, node_id: NodeId, addr: String) -> Result<()> {
        self.raft
            .add_learner(node_id, BasicNode { addr }, true)
            .await
            .map_err(map_write_error("add learner"))?;

        let mut voters: BTreeSet<NodeId> = self.membership().voters.into_iter().collect();
        voters.insert(node_id);
        self.raft
            .change_membership(voters, false)
            .await
            .map_err(map_write_error("change membership"))?;

        info!(node_id, "Added voter to cluster");
        Ok(())
    }

    /// Drop nodes from the cluster, as voters and as learners (must be leader)
    pub async fn remove_nodes(&self, node_ids: BTreeSet<NodeId>) -> Result<()> {
        if node_ids.is_empty() {
            return Ok(());
        }
        let membership = self.membership();
        let voters: BTreeSet<NodeId> = membership
            .voters
            .into_iter()
            .filter(|id| !node_ids.contains(id))
            .collect();
        self.raft
            .change_membership(voters, false)
            .await
            .map_err(map_write_error("change membership"))?;

        let learners: BTreeSet<NodeId> = self
            .membership()
            .learners
            .into_iter()
            .filter(|id| node_ids.contains(id))
            .collect();
        if !learners.is_empty() {
            self.raft
                .change_membership(ChangeMembers::RemoveNodes(learners), false)
                .await
                .map_err(map_write_error("remove learners"))?;
        }

        info!(?node_ids, "Removed nodes from cluster");
        Ok(())
    }

    pub async fn trigger_snapshot(&self) -> Result<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| QuarryError::Internal(format!("failed to trigger snapshot: {}", e)))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.raft
            .shutdown()
            .await
            .map_err(|e| QuarryError::Internal(format!("raft shutdown failed: {}", e)))
    }
}

fn map_write_error(
    what: &'static str,
) -> impl Fn(RaftError<NodeId, ClientWriteError<NodeId, BasicNode>>) -> QuarryError {
    move |e| match e {
        RaftError::APIError(ClientWriteError::ForwardToLeader(_)) => QuarryError::NotLeader,
        e => QuarryError::Consensus(format!("failed to {}: {}", what, e)),
    }
}
