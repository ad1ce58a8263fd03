use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::DocumentId;

/// Document score from one segment (or merged across segments)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDoc {
    pub score: u32,
    pub doc_id: DocumentId,
}

impl RankedDoc {
    pub fn new(doc_id: DocumentId, score: u32) -> Self {
        Self { score, doc_id }
    }
}

/// Search hit with its resolved raw body
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: u32,
    pub doc_id: DocumentId,
    pub body: Value,
}

/// Full-text search request against a single field
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub field: String,
    pub phrase: String,
    /// Keep only the best `limit` hits
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: usize,
    pub took_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_limit_is_optional() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"field":"title","phrase":"the beast"}"#).unwrap();
        assert_eq!(req.field, "title");
        assert!(req.limit.is_none());
    }
}
