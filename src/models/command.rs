use serde::{Deserialize, Serialize};

use super::document::DocumentId;
use crate::error::QuarryError;

/// Commands replicated via Raft consensus.
///
/// Entries never carry document bodies; `AddDocument` references a body the
/// leader already wrote to blob storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    CreateIndex {
        name: String,
        case_sensitive: bool,
        segment_capacity: usize,
    },
    AddDocument {
        index: String,
        doc_id: DocumentId,
    },
    /// Record a peer's HTTP address, keyed by its Raft address
    AddNode {
        address: String,
        http_address: String,
    },
}

impl Command {
    /// Get a human-readable name for this command (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateIndex { .. } => "CreateIndex",
            Command::AddDocument { .. } => "AddDocument",
            Command::AddNode { .. } => "AddNode",
        }
    }

    /// Index the command targets, if any
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Command::CreateIndex { name, .. } => Some(name),
            Command::AddDocument { index, .. } => Some(index),
            Command::AddNode { .. } => None,
        }
    }
}

/// Deterministic apply failures. Every replica produces the same one for the
/// same log entry, so they are returned to the proposer rather than halting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyError {
    IndexAlreadyExists(String),
    IndexNotFound(String),
    StaleDocumentId { doc_id: DocumentId, next: DocumentId },
    InvalidDocument(String),
}

impl From<ApplyError> for QuarryError {
    fn from(e: ApplyError) -> Self {
        match e {
            ApplyError::IndexAlreadyExists(name) => QuarryError::IndexAlreadyExists(name),
            ApplyError::IndexNotFound(name) => QuarryError::IndexNotFound(name),
            ApplyError::StaleDocumentId { doc_id, next } => {
                QuarryError::StaleDocumentId { doc_id, next }
            }
            ApplyError::InvalidDocument(msg) => QuarryError::InvalidDocument(msg),
        }
    }
}

/// Result of applying one command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResponse {
    IndexCreated,
    DocumentAdded { doc_id: DocumentId },
    NodeAdded,
    /// Membership and blank entries
    Noop,
    Rejected(ApplyError),
}

impl CommandResponse {
    pub fn into_result(self) -> crate::Result<CommandResponse> {
        match self {
            CommandResponse::Rejected(e) => Err(e.into()),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        let cmd = Command::AddNode {
            address: "127.0.0.1:7002".into(),
            http_address: "127.0.0.1:8082".into(),
        };
        assert_eq!(cmd.name(), "AddNode");
        assert_eq!(cmd.index_name(), None);

        let cmd = Command::AddDocument {
            index: "books".into(),
            doc_id: 4,
        };
        assert_eq!(cmd.index_name(), Some("books"));
    }

    #[test]
    fn test_command_bincode_roundtrip() {
        let cmd = Command::CreateIndex {
            name: "books".into(),
            case_sensitive: true,
            segment_capacity: 8,
        };
        let bytes = bincode::serialize(&cmd).unwrap();
        let back: Command = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_rejected_response_maps_to_error() {
        let resp = CommandResponse::Rejected(ApplyError::IndexNotFound("films".into()));
        let err = resp.into_result().unwrap_err();
        assert!(matches!(err, QuarryError::IndexNotFound(ref n) if n == "films"));
        assert!(CommandResponse::IndexCreated.into_result().is_ok());
    }
}
