use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::blob_store::BlobStore;
use crate::Result;

/// In-process blob store. Clones share the same contents, which is how the
/// nodes of a single-process test cluster share their storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Drop a blob; used by tests to simulate lost bodies
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.remove(key).map(|(_, v)| v)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.blobs.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|v| v.value().clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_contents() {
        let store = MemoryBlobStore::new();
        let other = store.clone();
        store.put("docs/a/1.json", vec![1, 2]).await.unwrap();
        assert_eq!(other.get("docs/a/1.json").await.unwrap(), Some(vec![1, 2]));
        assert_eq!(other.remove("docs/a/1.json"), Some(vec![1, 2]));
        assert!(store.is_empty());
    }
}
