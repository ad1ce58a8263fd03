use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::forward::Forwarder;
use super::reservation::IdReservations;
use crate::api::types::*;
use crate::config::NodeConfig;
use crate::consensus::{NodeId, RaftNode};
use crate::error::{QuarryError, Result};
use crate::metrics::SearchMetrics;
use crate::models::*;
use crate::persistence::document_key;
use crate::state_machine::SearchStateMachine;

const JOIN_ATTEMPTS: usize = 10;
const JOIN_RETRY_DELAY: Duration = Duration::from_millis(500);
const BOOTSTRAP_LEADER_TIMEOUT: Duration = Duration::from_secs(10);

/// Index names end up in URLs and blob keys
pub fn validate_index_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QuarryError::InvalidRequest(format!(
            "invalid index name '{}': use 1-128 ASCII letters, digits, '-' or '_'",
            name
        )))
    }
}

/// Entry point for every client operation.
///
/// Writes run on the leader; on any other node they are forwarded once.
/// Reads are answered from the local state machine.
pub struct ClusterService {
    node: RaftNode,
    machine: Arc<SearchStateMachine>,
    config: NodeConfig,
    forwarder: Forwarder,
    metrics: Arc<SearchMetrics>,
    /// Only meaningful on the leader
    reservations: IdReservations,
}

impl ClusterService {
    pub fn new(
        node: RaftNode,
        machine: Arc<SearchStateMachine>,
        config: NodeConfig,
        metrics: Arc<SearchMetrics>,
    ) -> Self {
        let forwarder = Forwarder::new(config.apply_timeout() + Duration::from_secs(5));
        Self {
            node,
            machine,
            config,
            forwarder,
            metrics,
            reservations: IdReservations::new(),
        }
    }

    pub fn node(&self) -> &RaftNode {
        &self.node
    }

    pub fn machine(&self) -> &Arc<SearchStateMachine> {
        &self.machine
    }

    pub fn metrics(&self) -> &Arc<SearchMetrics> {
        &self.metrics
    }

    /// Create an index. `forwarded` is set when another node relayed the call.
    pub async fn create_index(
        &self,
        req: CreateIndexRequest,
        forwarded: bool,
    ) -> Result<CreateIndexResponse> {
        validate_index_name(&req.name)?;
        if !self.node.is_leader() {
            return self
                .forward(forwarded, "create_index", "/create_index", &req)
                .await;
        }

        let cmd = Command::CreateIndex {
            name: req.name.clone(),
            case_sensitive: req
                .case_sensitive
                .unwrap_or(self.config.index_settings.case_sensitive),
            segment_capacity: self.config.index_settings.segment_capacity,
        };
        self.node.propose(cmd).await?.into_result()?;
        self.metrics.record_index_created();
        self.metrics.set_index_count(self.machine.index_names().len());
        info!(index = %req.name, "Index created");
        Ok(CreateIndexResponse { success: true })
    }

    /// Store a document body and replicate its `AddDocument` entry
    pub async fn add_document(
        &self,
        index: &str,
        body: DocumentBody,
        forwarded: bool,
    ) -> Result<AddDocumentResponse> {
        validate_index_name(index)?;
        let doc = Document::from_map(body.clone())?;
        if doc.fields.is_empty() {
            return Err(QuarryError::EmptyDocument);
        }
        if !self.node.is_leader() {
            let path = format!("/{}/add_document", index);
            return self.forward(forwarded, "add_document", &path, &body).await;
        }

        let start = Instant::now();
        // A new leader may not have applied its predecessor's entries yet.
        self.node.ensure_linearizable().await?;
        let idx = self.machine.get_index(index)?;
        let reservation = self
            .reservations
            .reserve(index, idx.next_doc_id(), self.machine.blobs().as_ref())
            .await?;
        let doc_id = reservation.id();

        self.machine
            .blobs()
            .put(&document_key(index, doc_id), serde_json::to_vec(&body)?)
            .await?;
        let outcome = self
            .node
            .propose(Command::AddDocument {
                index: index.to_string(),
                doc_id,
            })
            .await;
        // The entry may have committed even when the outcome is unknown, so
        // this id is never handed out again.
        drop(reservation);

        match outcome?.into_result()? {
            CommandResponse::DocumentAdded { doc_id } => {
                self.metrics
                    .record_document_added(start.elapsed().as_secs_f64());
                debug!(index, doc_id, "Document added");
                Ok(AddDocumentResponse {
                    doc_id,
                    success: true,
                })
            }
            other => Err(QuarryError::Internal(format!(
                "unexpected response to AddDocument: {:?}",
                other
            ))),
        }
    }

    pub async fn search_full_text(&self, index: &str, req: SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let results = self
            .machine
            .search_full_text(index, &req.field, &req.phrase, req.limit)
            .await;
        let elapsed = start.elapsed();

        match results {
            Ok(results) => {
                self.metrics.record_search(index, elapsed.as_secs_f64());
                Ok(SearchResponse {
                    count: results.len(),
                    results,
                    took_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => {
                self.metrics.record_search_error();
                Err(e)
            }
        }
    }

    pub async fn get_document(&self, index: &str, doc_id: DocumentId) -> Result<GetDocumentResponse> {
        let document = self.machine.get_document(index, doc_id).await?;
        Ok(GetDocumentResponse { doc_id, document })
    }

    pub fn list_indices(&self) -> ListIndicesResponse {
        let indices = self
            .machine
            .index_names()
            .into_iter()
            .filter_map(|name| self.machine.index(&name))
            .map(|index| IndexInfo {
                name: index.name().to_string(),
                case_sensitive: index.is_case_sensitive(),
                doc_count: index.doc_count(),
                segment_count: index.segment_count(),
                next_doc_id: index.next_doc_id(),
            })
            .collect();
        ListIndicesResponse { indices }
    }

    /// Add a node to the cluster and record its HTTP address
    pub async fn join(&self, req: JoinRequest, forwarded: bool) -> Result<JoinResponse> {
        if !self.node.is_leader() {
            return self.forward(forwarded, "join", "/join", &req).await;
        }

        let membership = self.node.membership();
        let is_voter = membership.voters.contains(&req.node_id);
        let same_member = membership.nodes.get(&req.node_id) == Some(&req.address);

        if same_member && is_voter {
            info!(node_id = req.node_id, address = %req.address, "Node already a member");
        } else {
            let conflicts: BTreeSet<NodeId> = membership
                .nodes
                .iter()
                .filter(|(id, addr)| {
                    (**id == req.node_id && **addr != req.address)
                        || (**id != req.node_id && **addr == req.address)
                })
                .map(|(id, _)| *id)
                .collect();
            if conflicts.contains(&self.node.id()) {
                return Err(QuarryError::InvalidRequest(format!(
                    "node {} at {} conflicts with the leader",
                    req.node_id, req.address
                )));
            }
            if !conflicts.is_empty() {
                warn!(?conflicts, "Removing members conflicting with joining node");
                self.node.remove_nodes(conflicts).await?;
            }
            self.node
                .add_voter(req.node_id, req.address.clone())
                .await?;
        }

        self.node
            .propose(Command::AddNode {
                address: req.address.clone(),
                http_address: req.http_address.clone(),
            })
            .await?
            .into_result()?;

        info!(node_id = req.node_id, address = %req.address, http = %req.http_address, "Node joined");
        Ok(JoinResponse {
            leader_http_address: self.config.http_addr.clone(),
        })
    }

    pub fn status(&self) -> StatusResponse {
        let membership = self.node.membership();
        let leader_id = self.node.leader_id();
        let info = |id: NodeId| {
            let address = membership
                .nodes
                .get(&id)
                .cloned()
                .unwrap_or_else(|| {
                    if id == self.node.id() {
                        self.config.raft_addr.clone()
                    } else {
                        String::new()
                    }
                });
            let http_address = self.machine.peer_http_address(&address);
            NodeInfo {
                node_id: id,
                address,
                http_address,
            }
        };

        let me = info(self.node.id());
        let leader = leader_id.map(&info);
        let followers = membership
            .nodes
            .keys()
            .filter(|id| Some(**id) != leader_id)
            .map(|id| info(*id))
            .collect();

        self.metrics.set_is_leader(self.node.is_leader());
        self.metrics.set_cluster_size(membership.nodes.len());
        StatusResponse {
            me,
            leader,
            followers,
        }
    }

    /// Refresh gauges before metrics are scraped
    pub fn refresh_gauges(&self) {
        self.metrics.set_is_leader(self.node.is_leader());
        self.metrics.set_cluster_size(self.node.membership().nodes.len());
        self.metrics.set_index_count(self.machine.index_names().len());
    }

    /// First start of a bootstrap node: form a one-node cluster and publish
    /// this node's HTTP address.
    pub async fn bootstrap(&self) -> Result<()> {
        if !self.node.initialize().await? {
            return Ok(());
        }
        self.node.wait_until_leader(BOOTSTRAP_LEADER_TIMEOUT).await?;
        self.node
            .propose(Command::AddNode {
                address: self.config.raft_addr.clone(),
                http_address: self.config.http_addr.clone(),
            })
            .await?
            .into_result()?;
        info!(node_id = self.node.id(), "Bootstrap node registered");
        Ok(())
    }

    /// Ask the member at `join_addr` to add this node, retrying while the
    /// cluster has no usable leader.
    pub async fn join_cluster(&self, join_addr: &str) -> Result<JoinResponse> {
        let req = JoinRequest {
            node_id: self.node.id(),
            address: self.config.raft_addr.clone(),
            http_address: self.config.http_addr.clone(),
        };

        let mut attempt = 1;
        loop {
            match self
                .forwarder
                .post::<_, JoinResponse>(join_addr, "/join", &req)
                .await
            {
                Ok(resp) => {
                    info!(leader = %resp.leader_http_address, "Joined cluster");
                    return Ok(resp);
                }
                Err(e) if e.is_retriable() && attempt < JOIN_ATTEMPTS => {
                    warn!(%join_addr, attempt, error = %e, "Join failed, retrying");
                    tokio::time::sleep(JOIN_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// HTTP address of the current leader
    pub fn leader_http_address(&self) -> Result<String> {
        let leader_id = self.node.leader_id().ok_or(QuarryError::NoLeaderDetected)?;
        let raft_addr = self
            .node
            .node_address(leader_id)
            .ok_or(QuarryError::NoLeaderDetected)?;
        self.machine
            .peer_http_address(&raft_addr)
            .ok_or(QuarryError::NoLeaderDetected)
    }

    async fn forward<Req, Resp>(
        &self,
        forwarded: bool,
        operation: &'static str,
        path: &str,
        body: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        if forwarded {
            return Err(QuarryError::NotLeader);
        }
        let leader = self.leader_http_address()?;
        self.metrics.record_forward(operation);
        debug!(operation, %leader, "Forwarding write to leader");
        self.forwarder.post(&leader, path, body).await
    }
}
