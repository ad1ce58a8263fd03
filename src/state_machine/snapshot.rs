use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::segment::IndexParts;

/// Snapshot version for compatibility checking
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete snapshot of the search state machine.
///
/// Only term dictionaries and counters are captured; bodies stay in blob
/// storage, which every node shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub version: u32,
    /// Sorted by index name
    pub indices: Vec<IndexParts>,
    /// Raft address -> HTTP address
    pub peers: BTreeMap<String, String>,
}

impl SearchSnapshot {
    pub fn new(indices: Vec<IndexParts>, peers: BTreeMap<String, String>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            indices,
            peers,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    pub fn is_compatible(&self) -> bool {
        self.version <= SNAPSHOT_VERSION
    }

    pub fn document_count(&self) -> usize {
        self.indices
            .iter()
            .map(|p| p.sealed.iter().map(|s| s.doc_count()).sum::<usize>() + p.active.doc_count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let parts = IndexParts {
            name: "books".into(),
            case_sensitive: false,
            segment_capacity: 10,
            next_doc_id: 1,
            segment_counter: 0,
            sealed: vec![],
            active: Segment::new("books-000000", "books"),
        };
        let mut peers = BTreeMap::new();
        peers.insert("127.0.0.1:7001".to_string(), "127.0.0.1:8081".to_string());

        let snapshot = SearchSnapshot::new(vec![parts], peers);
        let restored = SearchSnapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();

        assert_eq!(restored, snapshot);
        assert!(restored.is_compatible());
        assert_eq!(restored.document_count(), 0);
    }

    #[test]
    fn test_newer_version_is_incompatible() {
        let mut snapshot = SearchSnapshot::new(vec![], BTreeMap::new());
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(!snapshot.is_compatible());
    }
}
