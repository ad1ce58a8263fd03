use async_trait::async_trait;

use crate::models::DocumentId;
use crate::Result;

/// Key under which the body of `doc_id` in `index` is stored
pub fn document_key(index: &str, doc_id: DocumentId) -> String {
    format!("docs/{}/{}.json", index, doc_id)
}

/// Async key/value store shared by every node of a cluster
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `data` under `key`, replacing any previous value
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Fetch the value under `key`; `None` when nothing was stored
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
