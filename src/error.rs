use serde_json::{json, Value};
use thiserror::Error;

use crate::models::DocumentId;

/// Main error type for Quarry operations
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("index with specified name does not exist: {0}")]
    IndexNotFound(String),

    #[error("index name already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("no documents contain given term")]
    TermNotFound,

    #[error("document not found: {index}/{doc_id}")]
    DocumentNotFound { index: String, doc_id: DocumentId },

    #[error("empty document given")]
    EmptyDocument,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("stale document id {doc_id}, next expected id is {next}")]
    StaleDocumentId { doc_id: DocumentId, next: DocumentId },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("node not a leader")]
    NotLeader,

    #[error("no leader detected in the cluster")]
    NoLeaderDetected,

    #[error("blob storage error: {0}")]
    Blob(String),

    #[error("forwarding to leader failed: {0}")]
    Forward(String),

    #[error("consensus error: {0}")]
    Consensus(String),

    #[error("write was not committed within {0} ms, outcome unknown")]
    ApplyTimeout(u64),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: incompatible version {actual}, expected <= {expected}")]
    IncompatibleSnapshot { expected: u32, actual: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    /// Stable error code used on the wire and when re-mapping forwarded responses
    pub fn code(&self) -> &'static str {
        match self {
            QuarryError::IndexNotFound(_) => "index_not_found",
            QuarryError::IndexAlreadyExists(_) => "index_already_exists",
            QuarryError::TermNotFound => "term_not_found",
            QuarryError::DocumentNotFound { .. } => "document_not_found",
            QuarryError::EmptyDocument => "empty_document",
            QuarryError::InvalidDocument(_) => "invalid_document",
            QuarryError::StaleDocumentId { .. } => "stale_document_id",
            QuarryError::InvalidRequest(_) => "invalid_request",
            QuarryError::NotLeader => "not_leader",
            QuarryError::NoLeaderDetected => "no_leader_detected",
            QuarryError::Blob(_) => "blob_error",
            QuarryError::Forward(_) => "forward_error",
            QuarryError::Consensus(_) => "consensus_error",
            QuarryError::ApplyTimeout(_) => "apply_timeout",
            QuarryError::Serialization(_) => "serialization_error",
            QuarryError::Json(_) => "json_error",
            QuarryError::Io(_) => "io_error",
            QuarryError::IncompatibleSnapshot { .. } => "incompatible_snapshot",
            QuarryError::Internal(_) => "internal_error",
        }
    }

    /// Structured payload sent next to the message for variants whose
    /// fields cannot be recovered from the text alone
    pub fn details(&self) -> Option<Value> {
        match self {
            QuarryError::DocumentNotFound { index, doc_id } => {
                Some(json!({ "index": index, "doc_id": doc_id }))
            }
            QuarryError::StaleDocumentId { doc_id, next } => {
                Some(json!({ "doc_id": doc_id, "next": next }))
            }
            QuarryError::ApplyTimeout(ms) => Some(json!({ "timeout_ms": ms })),
            QuarryError::IncompatibleSnapshot { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
        }
    }

    /// Rebuild a local error from the code, message and details returned by
    /// another node.
    ///
    /// Every code produced by [`code`](Self::code) maps back to its variant.
    /// Unknown codes, or structured codes with unreadable details, become
    /// `Forward`.
    pub fn from_wire(code: &str, message: &str, details: Option<&Value>) -> Self {
        let detail = || strip_detail(message);
        let field = |name: &str| details.and_then(|d| d.get(name)).and_then(Value::as_u64);

        let known = match code {
            "index_not_found" => Some(QuarryError::IndexNotFound(detail())),
            "index_already_exists" => Some(QuarryError::IndexAlreadyExists(detail())),
            "term_not_found" => Some(QuarryError::TermNotFound),
            "document_not_found" => details
                .and_then(|d| d.get("index"))
                .and_then(Value::as_str)
                .zip(field("doc_id"))
                .map(|(index, doc_id)| QuarryError::DocumentNotFound {
                    index: index.to_string(),
                    doc_id,
                }),
            "empty_document" => Some(QuarryError::EmptyDocument),
            "invalid_document" => Some(QuarryError::InvalidDocument(detail())),
            "stale_document_id" => field("doc_id")
                .zip(field("next"))
                .map(|(doc_id, next)| QuarryError::StaleDocumentId { doc_id, next }),
            "invalid_request" => Some(QuarryError::InvalidRequest(detail())),
            "not_leader" => Some(QuarryError::NotLeader),
            "no_leader_detected" => Some(QuarryError::NoLeaderDetected),
            "blob_error" => Some(QuarryError::Blob(detail())),
            "forward_error" => Some(QuarryError::Forward(detail())),
            "consensus_error" => Some(QuarryError::Consensus(detail())),
            "apply_timeout" => field("timeout_ms").map(QuarryError::ApplyTimeout),
            "serialization_error" => Some(QuarryError::Serialization(Box::new(
                bincode::ErrorKind::Custom(detail()),
            ))),
            "json_error" => Some(QuarryError::Json(serde::de::Error::custom(detail()))),
            "io_error" => Some(QuarryError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                detail(),
            ))),
            "incompatible_snapshot" => field("expected")
                .zip(field("actual"))
                .map(|(expected, actual)| QuarryError::IncompatibleSnapshot {
                    expected: expected as u32,
                    actual: actual as u32,
                }),
            "internal_error" => Some(QuarryError::Internal(detail())),
            _ => None,
        };
        known.unwrap_or_else(|| QuarryError::Forward(format!("{}: {}", code, message)))
    }

    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            QuarryError::NotLeader
                | QuarryError::NoLeaderDetected
                | QuarryError::Consensus(_)
                | QuarryError::Forward(_)
        )
    }
}

/// Error messages are rendered as "<prefix>: <detail>"; keep the detail only.
fn strip_detail(message: &str) -> String {
    match message.split_once(": ") {
        Some((_, detail)) => detail.to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuarryError::IndexAlreadyExists("books".to_string());
        assert_eq!(err.to_string(), "index name already exists: books");
    }

    fn every_variant() -> Vec<QuarryError> {
        vec![
            QuarryError::IndexNotFound("films".into()),
            QuarryError::IndexAlreadyExists("books".into()),
            QuarryError::TermNotFound,
            QuarryError::DocumentNotFound {
                index: "books".into(),
                doc_id: 7,
            },
            QuarryError::EmptyDocument,
            QuarryError::InvalidDocument("field 'meta' is not a flat value".into()),
            QuarryError::StaleDocumentId { doc_id: 4, next: 5 },
            QuarryError::InvalidRequest("invalid index name 'a/b': use letters".into()),
            QuarryError::NotLeader,
            QuarryError::NoLeaderDetected,
            QuarryError::Blob("docs/books/1.json after 5 attempts".into()),
            QuarryError::Forward("leader replied with status 500".into()),
            QuarryError::Consensus("AddDocument failed".into()),
            QuarryError::ApplyTimeout(5000),
            QuarryError::Serialization(Box::new(bincode::ErrorKind::Custom("bad tag".into()))),
            QuarryError::Json(serde_json::from_str::<Value>("{").unwrap_err()),
            QuarryError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
            QuarryError::IncompatibleSnapshot {
                expected: 1,
                actual: 3,
            },
            QuarryError::Internal("search task failed".into()),
        ]
    }

    #[test]
    fn test_wire_roundtrip_keeps_variant_and_detail() {
        for err in every_variant() {
            let details = err.details();
            let back = QuarryError::from_wire(err.code(), &err.to_string(), details.as_ref());
            assert_eq!(back.code(), err.code(), "code changed for {:?}", err);
            assert_eq!(back.to_string(), err.to_string(), "message changed for {:?}", err);
        }
    }

    #[test]
    fn test_structured_fields_survive_the_wire() {
        let err = QuarryError::StaleDocumentId { doc_id: 4, next: 5 };
        let back = QuarryError::from_wire(err.code(), &err.to_string(), err.details().as_ref());
        assert!(matches!(back, QuarryError::StaleDocumentId { doc_id: 4, next: 5 }));

        let err = QuarryError::ApplyTimeout(5000);
        let back = QuarryError::from_wire(err.code(), &err.to_string(), err.details().as_ref());
        assert!(matches!(back, QuarryError::ApplyTimeout(5000)));
    }

    #[test]
    fn test_structured_code_without_details_becomes_forward_error() {
        let back = QuarryError::from_wire("stale_document_id", "stale document id 4", None);
        assert!(matches!(back, QuarryError::Forward(_)));
    }

    #[test]
    fn test_unknown_wire_code_becomes_forward_error() {
        let back = QuarryError::from_wire("teapot", "short and stout", None);
        assert!(matches!(back, QuarryError::Forward(_)));
    }

    #[test]
    fn test_retriable_errors() {
        assert!(QuarryError::NotLeader.is_retriable());
        assert!(QuarryError::NoLeaderDetected.is_retriable());
        assert!(!QuarryError::IndexNotFound("x".into()).is_retriable());
        assert!(!QuarryError::ApplyTimeout(10).is_retriable());
    }
}
