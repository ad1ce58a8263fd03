use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{QuarryError, Result};
use crate::models::*;
use crate::persistence::{document_key, BlobStore};
use crate::search;
use crate::segment::Index;
use crate::state_machine::snapshot::{SearchSnapshot, SNAPSHOT_VERSION};

/// How hard `AddDocument` tries to read a body before giving up
#[derive(Clone, Copy, Debug)]
pub struct BlobRetry {
    pub attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for BlobRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Replicated search state: every index plus the peer address map.
///
/// Mutated only by [`apply_command`](Self::apply_command), in log order.
/// Reads go straight to the indices and may trail the leader.
pub struct SearchStateMachine {
    indices: RwLock<HashMap<String, Arc<Index>>>,
    peers: RwLock<BTreeMap<String, String>>,
    blobs: Arc<dyn BlobStore>,
    search_workers: usize,
    retry: BlobRetry,
}

impl SearchStateMachine {
    pub fn new(blobs: Arc<dyn BlobStore>, search_workers: usize) -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            peers: RwLock::new(BTreeMap::new()),
            blobs,
            search_workers: search_workers.max(1),
            retry: BlobRetry::default(),
        }
    }

    pub fn with_blob_retry(mut self, retry: BlobRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    /// Apply one committed command.
    ///
    /// Deterministic failures come back as `CommandResponse::Rejected`. An
    /// `Err` means this replica could not apply the entry at all and must
    /// not continue.
    pub async fn apply_command(&self, cmd: Command) -> Result<CommandResponse> {
        debug!(command = cmd.name(), index = ?cmd.index_name(), "Applying command");
        match cmd {
            Command::CreateIndex {
                name,
                case_sensitive,
                segment_capacity,
            } => Ok(self.handle_create_index(name, case_sensitive, segment_capacity)),
            Command::AddDocument { index, doc_id } => self.handle_add_document(&index, doc_id).await,
            Command::AddNode {
                address,
                http_address,
            } => {
                info!(%address, %http_address, "Registered peer");
                self.peers.write().insert(address, http_address);
                Ok(CommandResponse::NodeAdded)
            }
        }
    }

    fn handle_create_index(
        &self,
        name: String,
        case_sensitive: bool,
        segment_capacity: usize,
    ) -> CommandResponse {
        let mut indices = self.indices.write();
        if indices.contains_key(&name) {
            return CommandResponse::Rejected(ApplyError::IndexAlreadyExists(name));
        }
        info!(index = %name, case_sensitive, segment_capacity, "Created index");
        let index = Index::new(name.clone(), case_sensitive, segment_capacity);
        indices.insert(name, Arc::new(index));
        CommandResponse::IndexCreated
    }

    async fn handle_add_document(&self, name: &str, doc_id: DocumentId) -> Result<CommandResponse> {
        let Some(index) = self.index(name) else {
            return Ok(CommandResponse::Rejected(ApplyError::IndexNotFound(
                name.to_string(),
            )));
        };

        // Checked before the blob read so a replayed entry never needs its body
        let next = index.next_doc_id();
        if doc_id < next {
            return Ok(CommandResponse::Rejected(ApplyError::StaleDocumentId {
                doc_id,
                next,
            }));
        }

        let bytes = self.fetch_body(name, doc_id).await?;
        let doc = match Document::from_json(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(index = %name, doc_id, error = %e, "Rejected unparseable document");
                return Ok(CommandResponse::Rejected(ApplyError::InvalidDocument(
                    e.to_string(),
                )));
            }
        };

        match index.add_document_with_id(doc, doc_id) {
            Ok(doc_id) => Ok(CommandResponse::DocumentAdded { doc_id }),
            Err(QuarryError::StaleDocumentId { doc_id, next }) => Ok(CommandResponse::Rejected(
                ApplyError::StaleDocumentId { doc_id, next },
            )),
            Err(e @ QuarryError::EmptyDocument) => Ok(CommandResponse::Rejected(
                ApplyError::InvalidDocument(e.to_string()),
            )),
            Err(e) => Err(e),
        }
    }

    async fn fetch_body(&self, index: &str, doc_id: DocumentId) -> Result<Vec<u8>> {
        let key = document_key(index, doc_id);
        let mut backoff = self.retry.initial_backoff;
        let attempts = self.retry.attempts.max(1);

        let mut attempt = 1;
        loop {
            let failure = match self.blobs.get(&key).await {
                Ok(Some(bytes)) => return Ok(bytes),
                Ok(None) => "body not found".to_string(),
                Err(e) => e.to_string(),
            };
            if attempt >= attempts {
                return Err(QuarryError::Blob(format!(
                    "{} after {} attempts: {}",
                    key, attempts, failure
                )));
            }
            warn!(%key, attempt, error = %failure, "Blob read failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.retry.max_backoff);
            attempt += 1;
        }
    }

    pub fn index(&self, name: &str) -> Option<Arc<Index>> {
        self.indices.read().get(name).cloned()
    }

    pub fn get_index(&self, name: &str) -> Result<Arc<Index>> {
        self.index(name)
            .ok_or_else(|| QuarryError::IndexNotFound(name.to_string()))
    }

    /// Index names in ascending order
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn peer_http_address(&self, raft_address: &str) -> Option<String> {
        self.peers.read().get(raft_address).cloned()
    }

    pub fn peers(&self) -> BTreeMap<String, String> {
        self.peers.read().clone()
    }

    /// Ranked hits for `phrase` in `field`, before body resolution
    pub async fn rank(
        &self,
        index: &str,
        field: &str,
        phrase: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RankedDoc>> {
        let index = self.get_index(index)?;
        let terms = index.terms_for(field, phrase);
        let workers = self.search_workers;
        let hits = tokio::task::spawn_blocking(move || index.search_full_text(&terms, workers))
            .await
            .map_err(|e| QuarryError::Internal(format!("search task failed: {}", e)))?;
        Ok(search::apply_limit(hits, limit))
    }

    /// Full-text search with bodies attached
    pub async fn search_full_text(
        &self,
        index: &str,
        field: &str,
        phrase: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let hits = self.rank(index, field, phrase, limit).await?;
        Ok(search::resolve_bodies(self.blobs.as_ref(), index, hits).await)
    }

    /// Stored body of an applied document
    pub async fn get_document(&self, index: &str, doc_id: DocumentId) -> Result<serde_json::Value> {
        let idx = self.get_index(index)?;
        let not_found = || QuarryError::DocumentNotFound {
            index: index.to_string(),
            doc_id,
        };
        if doc_id == 0 || doc_id >= idx.next_doc_id() {
            return Err(not_found());
        }
        let bytes = self
            .blobs
            .get(&document_key(index, doc_id))
            .await?
            .ok_or_else(not_found)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn create_snapshot(&self) -> Result<Vec<u8>> {
        let mut indices: Vec<_> = self
            .indices
            .read()
            .values()
            .map(|index| index.to_parts())
            .collect();
        indices.sort_by(|a, b| a.name.cmp(&b.name));
        let snapshot = SearchSnapshot::new(indices, self.peers());
        Ok(snapshot.to_bytes()?)
    }

    /// Replace all state with a snapshot. Empty data resets to an empty machine.
    pub fn restore_snapshot(&self, data: &[u8]) -> Result<()> {
        let snapshot = if data.is_empty() {
            SearchSnapshot::new(Vec::new(), BTreeMap::new())
        } else {
            SearchSnapshot::from_bytes(data)?
        };
        if !snapshot.is_compatible() {
            return Err(QuarryError::IncompatibleSnapshot {
                expected: SNAPSHOT_VERSION,
                actual: snapshot.version,
            });
        }

        let documents = snapshot.document_count();
        let indices: HashMap<String, Arc<Index>> = snapshot
            .indices
            .into_iter()
            .map(|parts| (parts.name.clone(), Arc::new(Index::from_parts(parts))))
            .collect();
        info!(indices = indices.len(), documents, "Restored state machine from snapshot");

        *self.indices.write() = indices;
        *self.peers.write() = snapshot.peers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBlobStore;
    use serde_json::json;

    fn machine() -> (SearchStateMachine, MemoryBlobStore) {
        let blobs = MemoryBlobStore::new();
        let sm = SearchStateMachine::new(Arc::new(blobs.clone()), 2).with_blob_retry(BlobRetry {
            attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        });
        (sm, blobs)
    }

    fn create(name: &str, capacity: usize) -> Command {
        Command::CreateIndex {
            name: name.into(),
            case_sensitive: false,
            segment_capacity: capacity,
        }
    }

    async fn put_body(blobs: &MemoryBlobStore, index: &str, id: u64, body: serde_json::Value) {
        blobs
            .put(&document_key(index, id), serde_json::to_vec(&body).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_index_twice_is_rejected() {
        let (sm, _) = machine();
        assert_eq!(
            sm.apply_command(create("books", 10)).await.unwrap(),
            CommandResponse::IndexCreated
        );
        assert_eq!(
            sm.apply_command(create("books", 10)).await.unwrap(),
            CommandResponse::Rejected(ApplyError::IndexAlreadyExists("books".into()))
        );
        assert_eq!(sm.index_names(), vec!["books".to_string()]);
    }

    #[tokio::test]
    async fn test_add_document_and_search() {
        let (sm, blobs) = machine();
        sm.apply_command(create("books", 10)).await.unwrap();
        put_body(&blobs, "books", 1, json!({"title": "Rise of the Beast"})).await;
        put_body(&blobs, "books", 2, json!({"title": "Taken, The"})).await;

        for id in [1, 2] {
            let resp = sm
                .apply_command(Command::AddDocument {
                    index: "books".into(),
                    doc_id: id,
                })
                .await
                .unwrap();
            assert_eq!(resp, CommandResponse::DocumentAdded { doc_id: id });
        }

        let results = sm.search_full_text("books", "title", "the", None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            sm.get_document("books", 2).await.unwrap(),
            json!({"title": "Taken, The"})
        );
    }

    #[tokio::test]
    async fn test_add_to_missing_index_is_rejected() {
        let (sm, _) = machine();
        let resp = sm
            .apply_command(Command::AddDocument {
                index: "films".into(),
                doc_id: 1,
            })
            .await
            .unwrap();
        assert_eq!(
            resp,
            CommandResponse::Rejected(ApplyError::IndexNotFound("films".into()))
        );
    }

    #[tokio::test]
    async fn test_replayed_entry_is_not_reapplied() {
        let (sm, blobs) = machine();
        sm.apply_command(create("books", 10)).await.unwrap();
        put_body(&blobs, "books", 1, json!({"title": "once"})).await;
        let add = Command::AddDocument {
            index: "books".into(),
            doc_id: 1,
        };
        sm.apply_command(add.clone()).await.unwrap();
        // the body is gone; a replay must not need it
        blobs.remove(&document_key("books", 1));

        let resp = sm.apply_command(add).await.unwrap();
        assert_eq!(
            resp,
            CommandResponse::Rejected(ApplyError::StaleDocumentId { doc_id: 1, next: 2 })
        );
        assert_eq!(sm.get_index("books").unwrap().doc_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_body_is_fatal() {
        let (sm, _) = machine();
        sm.apply_command(create("books", 10)).await.unwrap();
        let err = sm
            .apply_command(Command::AddDocument {
                index: "books".into(),
                doc_id: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::Blob(_)));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_rejected() {
        let (sm, blobs) = machine();
        sm.apply_command(create("books", 10)).await.unwrap();
        blobs
            .put(&document_key("books", 1), b"not json".to_vec())
            .await
            .unwrap();
        let resp = sm
            .apply_command(Command::AddDocument {
                index: "books".into(),
                doc_id: 1,
            })
            .await
            .unwrap();
        assert!(matches!(
            resp,
            CommandResponse::Rejected(ApplyError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_restore_reproduces_state() {
        let (sm, blobs) = machine();
        sm.apply_command(create("books", 2)).await.unwrap();
        sm.apply_command(Command::AddNode {
            address: "127.0.0.1:7001".into(),
            http_address: "127.0.0.1:8081".into(),
        })
        .await
        .unwrap();
        for id in 1..=3 {
            put_body(&blobs, "books", id, json!({"title": format!("book {}", id)})).await;
            sm.apply_command(Command::AddDocument {
                index: "books".into(),
                doc_id: id,
            })
            .await
            .unwrap();
        }

        let bytes = sm.create_snapshot().unwrap();
        let (other, _) = machine();
        other.restore_snapshot(&bytes).unwrap();

        let a = sm.get_index("books").unwrap();
        let b = other.get_index("books").unwrap();
        assert_eq!(a.to_parts(), b.to_parts());
        assert_eq!(b.doc_count(), 3);
        assert_eq!(b.segment_count(), 2);
        assert_eq!(
            other.peer_http_address("127.0.0.1:7001").as_deref(),
            Some("127.0.0.1:8081")
        );

        other.restore_snapshot(&[]).unwrap();
        assert!(other.index_names().is_empty());
    }

    #[tokio::test]
    async fn test_search_unknown_index() {
        let (sm, _) = machine();
        let err = sm
            .search_full_text("nope", "title", "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::IndexNotFound(_)));
    }
}
