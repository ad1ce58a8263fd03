use tracing::warn;

use crate::models::{RankedDoc, SearchResult};
use crate::persistence::{document_key, BlobStore};

/// Attach stored bodies to ranked hits, one blob read at a time.
///
/// A hit whose body is missing or unreadable is logged and skipped, so the
/// returned list may be shorter than `hits`.
pub async fn resolve_bodies(
    blobs: &dyn BlobStore,
    index: &str,
    hits: Vec<RankedDoc>,
) -> Vec<SearchResult> {
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let key = document_key(index, hit.doc_id);
        let bytes = match blobs.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(index, doc_id = hit.doc_id, "Document body missing from blob storage");
                continue;
            }
            Err(e) => {
                warn!(index, doc_id = hit.doc_id, error = %e, "Failed to read document body");
                continue;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(body) => results.push(SearchResult {
                score: hit.score,
                doc_id: hit.doc_id,
                body,
            }),
            Err(e) => warn!(index, doc_id = hit.doc_id, error = %e, "Stored document body is not JSON"),
        }
    }
    results
}
