use serde::{Deserialize, Serialize};

use crate::consensus::NodeId;
use crate::error::QuarryError;
use crate::models::DocumentId;

/// Request to create an index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    pub name: String,
    /// Falls back to the leader's configured default
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexResponse {
    pub success: bool,
}

/// Response after adding a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocumentResponse {
    pub doc_id: DocumentId,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDocumentRequest {
    pub doc_id: DocumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDocumentResponse {
    pub doc_id: DocumentId,
    pub document: serde_json::Value,
}

/// Summary of one index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub case_sensitive: bool,
    pub doc_count: usize,
    pub segment_count: usize,
    pub next_doc_id: DocumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListIndicesResponse {
    pub indices: Vec<IndexInfo>,
}

/// Request from a node asking to become a cluster member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub node_id: NodeId,
    /// Raft address of the joining node
    pub address: String,
    pub http_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub leader_http_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub address: String,
    /// Unknown until the node's `AddNode` entry has been applied here
    pub http_address: Option<String>,
}

/// Cluster status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub me: NodeInfo,
    pub leader: Option<NodeInfo>,
    pub followers: Vec<NodeInfo>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// API Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Structured fields of the error, e.g. `doc_id` and `next`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<serde_json::Value>) -> Self {
        self.details = details;
        self
    }
}

impl From<&QuarryError> for ErrorResponse {
    fn from(e: &QuarryError) -> Self {
        ErrorResponse::new(e.code(), e.to_string()).with_details(e.details())
    }
}
