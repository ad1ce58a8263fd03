use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::{self, Cursor};
use std::ops::RangeBounds;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use openraft::storage::{LogFlushed, LogState, RaftLogStorage, RaftStateMachine, Snapshot};
use openraft::{
    BasicNode, Entry, EntryPayload, OptionalSend, RaftLogReader, RaftSnapshotBuilder,
    SnapshotMeta, StorageError, StorageIOError, StoredMembership, Vote,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{NodeId, QuarryLogId, TypeConfig};
use crate::error::{QuarryError, Result};
use crate::models::CommandResponse;
use crate::state_machine::SearchStateMachine;

const LOG_FILE: &str = "raft_log.bin";
const SNAPSHOT_FILE: &str = "snapshot.bin";

/// Persisted Raft log state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStoreState {
    pub last_purged_log_id: Option<QuarryLogId>,
    pub logs: BTreeMap<u64, Entry<TypeConfig>>,
    pub vote: Option<Vote<NodeId>>,
    pub committed: Option<QuarryLogId>,
}

/// Raft log storage persisted to a single bincode file.
///
/// Clones share state, so the log reader handed to openraft always sees the
/// latest entries.
#[derive(Clone)]
pub struct LogStore {
    path: PathBuf,
    state: Arc<RwLock<LogStoreState>>,
}

impl LogStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOG_FILE);
        let state = if path.exists() {
            let state: LogStoreState = bincode::deserialize(&std::fs::read(&path)?)?;
            info!(
                entries = state.logs.len(),
                last_purged = ?state.last_purged_log_id,
                "Loaded raft log"
            );
            state
        } else {
            LogStoreState::default()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    fn persist(&self) -> std::result::Result<(), io::Error> {
        let data = bincode::serialize(&*self.state.read())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.path, &data)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::result::Result<(), io::Error> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

impl RaftLogReader<TypeConfig> for LogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> std::result::Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>> {
        let state = self.state.read();
        Ok(state.logs.range(range).map(|(_, v)| v.clone()).collect())
    }
}

impl RaftLogStorage<TypeConfig> for LogStore {
    type LogReader = Self;

    async fn get_log_state(
        &mut self,
    ) -> std::result::Result<LogState<TypeConfig>, StorageError<NodeId>> {
        let state = self.state.read();
        let last_purged_log_id = state.last_purged_log_id;
        let last_log_id = state
            .logs
            .last_key_value()
            .map(|(_, v)| v.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn read_vote(&mut self) -> std::result::Result<Option<Vote<NodeId>>, StorageError<NodeId>> {
        Ok(self.state.read().vote)
    }

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> std::result::Result<(), StorageError<NodeId>> {
        self.state.write().vote = Some(*vote);
        self.persist().map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn save_committed(
        &mut self,
        committed: Option<QuarryLogId>,
    ) -> std::result::Result<(), StorageError<NodeId>> {
        self.state.write().committed = committed;
        self.persist().map_err(|e| StorageIOError::write(&e))?;
        Ok(())
    }

    async fn read_committed(
        &mut self,
    ) -> std::result::Result<Option<QuarryLogId>, StorageError<NodeId>> {
        Ok(self.state.read().committed)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> std::result::Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        {
            let mut state = self.state.write();
            for entry in entries {
                state.logs.insert(entry.log_id.index, entry);
            }
        }

        match self.persist() {
            Ok(()) => {
                callback.log_io_completed(Ok(()));
                Ok(())
            }
            Err(e) => {
                let storage_err = StorageIOError::write_logs(&e);
                callback.log_io_completed(Err(e));
                Err(storage_err.into())
            }
        }
    }

    async fn truncate(&mut self, log_id: QuarryLogId) -> std::result::Result<(), StorageError<NodeId>> {
        debug!(?log_id, "Truncating raft log");
        self.state.write().logs.split_off(&log_id.index);
        self.persist().map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn purge(&mut self, log_id: QuarryLogId) -> std::result::Result<(), StorageError<NodeId>> {
        debug!(?log_id, "Purging raft log");
        {
            let mut state = self.state.write();
            let keep = state.logs.split_off(&(log_id.index + 1));
            state.logs = keep;
            state.last_purged_log_id = Some(log_id);
        }
        self.persist().map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }
}

/// Applied position of the state machine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppliedState {
    pub last_applied_log: Option<QuarryLogId>,
    pub last_membership: StoredMembership<NodeId, BasicNode>,
}

/// A built snapshot, kept in memory and mirrored to `snapshot.bin`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub meta: SnapshotMeta<NodeId, BasicNode>,
    pub data: Vec<u8>,
}

/// Raft state machine backed by [`SearchStateMachine`].
///
/// Applied state is not persisted on its own: on start the latest snapshot
/// is restored and openraft replays the committed entries that follow it.
#[derive(Clone)]
pub struct StateMachineStore {
    data_dir: PathBuf,
    applied: Arc<RwLock<AppliedState>>,
    current_snapshot: Arc<RwLock<Option<StoredSnapshot>>>,
    snapshot_idx: Arc<AtomicU64>,
    machine: Arc<SearchStateMachine>,
}

impl StateMachineStore {
    pub fn open(data_dir: &Path, machine: Arc<SearchStateMachine>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SNAPSHOT_FILE);

        let mut applied = AppliedState::default();
        let mut current = None;
        if path.exists() {
            let stored: StoredSnapshot = bincode::deserialize(&std::fs::read(&path)?)?;
            machine.restore_snapshot(&stored.data)?;
            info!(
                snapshot_id = %stored.meta.snapshot_id,
                last_log_id = ?stored.meta.last_log_id,
                "Restored state machine from snapshot file"
            );
            applied.last_applied_log = stored.meta.last_log_id;
            applied.last_membership = stored.meta.last_membership.clone();
            current = Some(stored);
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            applied: Arc::new(RwLock::new(applied)),
            current_snapshot: Arc::new(RwLock::new(current)),
            snapshot_idx: Arc::new(AtomicU64::new(0)),
            machine,
        })
    }

    pub fn machine(&self) -> Arc<SearchStateMachine> {
        self.machine.clone()
    }

    fn save_snapshot(&self, stored: StoredSnapshot) -> std::result::Result<(), StorageError<NodeId>> {
        let signature = stored.meta.signature();
        let data = bincode::serialize(&stored)
            .map_err(|e| StorageIOError::write_snapshot(Some(signature.clone()), &e))?;
        write_atomic(&self.data_dir.join(SNAPSHOT_FILE), &data)
            .map_err(|e| StorageIOError::write_snapshot(Some(signature), &e))?;
        *self.current_snapshot.write() = Some(stored);
        Ok(())
    }
}

/// Snapshot builder holding the state captured when it was requested
pub struct SnapshotBuilder {
    applied: AppliedState,
    captured: Result<Vec<u8>>,
    store: StateMachineStore,
}

impl RaftSnapshotBuilder<TypeConfig> for SnapshotBuilder {
    async fn build_snapshot(&mut self) -> std::result::Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        let data = std::mem::replace(&mut self.captured, Ok(Vec::new()))
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        let last_applied = self.applied.last_applied_log;
        let idx = self.store.snapshot_idx.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot_id = match last_applied {
            Some(last) => format!("{}-{}-{}", last.leader_id, last.index, idx),
            None => format!("--{}", idx),
        };

        let meta = SnapshotMeta {
            last_log_id: last_applied,
            last_membership: self.applied.last_membership.clone(),
            snapshot_id,
        };
        info!(
            snapshot_id = %meta.snapshot_id,
            bytes = data.len(),
            "Built snapshot"
        );

        self.store.save_snapshot(StoredSnapshot {
            meta: meta.clone(),
            data: data.clone(),
        })?;

        Ok(Snapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for StateMachineStore {
    type SnapshotBuilder = SnapshotBuilder;

    async fn applied_state(
        &mut self,
    ) -> std::result::Result<
        (Option<QuarryLogId>, StoredMembership<NodeId, BasicNode>),
        StorageError<NodeId>,
    > {
        let applied = self.applied.read();
        Ok((applied.last_applied_log, applied.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> std::result::Result<Vec<CommandResponse>, StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        let mut responses = Vec::new();

        for entry in entries {
            let log_id = entry.log_id;
            let response = match entry.payload {
                EntryPayload::Normal(cmd) => self
                    .machine
                    .apply_command(cmd)
                    .await
                    .map_err(|e| StorageIOError::apply(log_id, &e))?,
                EntryPayload::Membership(membership) => {
                    self.applied.write().last_membership =
                        StoredMembership::new(Some(log_id), membership);
                    CommandResponse::Noop
                }
                EntryPayload::Blank => CommandResponse::Noop,
            };
            self.applied.write().last_applied_log = Some(log_id);
            responses.push(response);
        }

        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        // Captured together so the snapshot never runs ahead of its log id
        let applied = self.applied.read().clone();
        let captured = self.machine.create_snapshot();
        SnapshotBuilder {
            applied,
            captured,
            store: self.clone(),
        }
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> std::result::Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<NodeId, BasicNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> std::result::Result<(), StorageError<NodeId>> {
        let data = snapshot.into_inner();
        self.machine
            .restore_snapshot(&data)
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        {
            let mut applied = self.applied.write();
            applied.last_applied_log = meta.last_log_id;
            applied.last_membership = meta.last_membership.clone();
        }
        info!(snapshot_id = %meta.snapshot_id, "Installed snapshot from leader");

        self.save_snapshot(StoredSnapshot {
            meta: meta.clone(),
            data,
        })
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> std::result::Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        Ok(self.current_snapshot.read().clone().map(|stored| Snapshot {
            meta: stored.meta,
            snapshot: Box::new(Cursor::new(stored.data)),
        }))
    }
}

impl From<StorageError<NodeId>> for QuarryError {
    fn from(e: StorageError<NodeId>) -> Self {
        QuarryError::Consensus(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Command;
    use crate::persistence::{document_key, BlobStore, MemoryBlobStore};
    use openraft::{CommittedLeaderId, LogId};

    fn log_id(term: u64, index: u64) -> QuarryLogId {
        LogId::new(CommittedLeaderId::new(term, 1), index)
    }

    fn entry(index: u64, cmd: Command) -> Entry<TypeConfig> {
        Entry {
            log_id: log_id(1, index),
            payload: EntryPayload::Normal(cmd),
        }
    }

    fn machine(blobs: &MemoryBlobStore) -> Arc<SearchStateMachine> {
        Arc::new(SearchStateMachine::new(Arc::new(blobs.clone()), 2))
    }

    #[tokio::test]
    async fn test_log_store_reopens_vote_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = LogStore::open(dir.path()).unwrap();
            store.save_vote(&Vote::new(3, 1)).await.unwrap();
            store.state.write().logs.insert(
                1,
                entry(
                    1,
                    Command::AddNode {
                        address: "a".into(),
                        http_address: "b".into(),
                    },
                ),
            );
            store.persist().unwrap();
        }

        let mut store = LogStore::open(dir.path()).unwrap();
        assert_eq!(store.read_vote().await.unwrap(), Some(Vote::new(3, 1)));
        let mut reader = store.get_log_reader().await;
        assert_eq!(reader.try_get_log_entries(0..10).await.unwrap().len(), 1);
        let state = store.get_log_state().await.unwrap();
        assert_eq!(state.last_log_id, Some(log_id(1, 1)));
    }

    #[tokio::test]
    async fn test_reader_sees_entries_written_after_creation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LogStore::open(dir.path()).unwrap();
        let mut reader = store.get_log_reader().await;
        store.state.write().logs.insert(
            1,
            entry(
                1,
                Command::AddNode {
                    address: "a".into(),
                    http_address: "b".into(),
                },
            ),
        );
        assert_eq!(reader.try_get_log_entries(1..2).await.unwrap().len(), 1);

        store.purge(log_id(1, 1)).await.unwrap();
        assert!(reader.try_get_log_entries(0..10).await.unwrap().is_empty());
        let state = store.get_log_state().await.unwrap();
        assert_eq!(state.last_purged_log_id, Some(log_id(1, 1)));
        assert_eq!(state.last_log_id, Some(log_id(1, 1)));
    }

    #[tokio::test]
    async fn test_snapshot_is_captured_with_its_applied_log_id() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = MemoryBlobStore::new();
        let mut sm = StateMachineStore::open(dir.path(), machine(&blobs)).unwrap();

        sm.apply(vec![entry(
            1,
            Command::CreateIndex {
                name: "books".into(),
                case_sensitive: false,
                segment_capacity: 10,
            },
        )])
        .await
        .unwrap();
        let mut builder = sm.get_snapshot_builder().await;

        // applied after the builder was requested; must not leak into the snapshot
        blobs
            .put(&document_key("books", 1), br#"{"title":"late"}"#.to_vec())
            .await
            .unwrap();
        sm.apply(vec![entry(
            2,
            Command::AddDocument {
                index: "books".into(),
                doc_id: 1,
            },
        )])
        .await
        .unwrap();

        let snapshot = builder.build_snapshot().await.unwrap();
        assert_eq!(snapshot.meta.last_log_id, Some(log_id(1, 1)));

        let other_dir = tempfile::tempdir().unwrap();
        let mut other = StateMachineStore::open(other_dir.path(), machine(&blobs)).unwrap();
        other
            .install_snapshot(&snapshot.meta, snapshot.snapshot)
            .await
            .unwrap();
        let index = other.machine().get_index("books").unwrap();
        assert_eq!(index.doc_count(), 0);

        // replaying entry 2 on top of the snapshot applies it exactly once
        other
            .apply(vec![entry(
                2,
                Command::AddDocument {
                    index: "books".into(),
                    doc_id: 1,
                },
            )])
            .await
            .unwrap();
        assert_eq!(index.doc_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_file_restores_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = MemoryBlobStore::new();
        {
            let mut sm = StateMachineStore::open(dir.path(), machine(&blobs)).unwrap();
            sm.apply(vec![entry(
                1,
                Command::CreateIndex {
                    name: "films".into(),
                    case_sensitive: true,
                    segment_capacity: 4,
                },
            )])
            .await
            .unwrap();
            sm.get_snapshot_builder().await.build_snapshot().await.unwrap();
        }

        let mut sm = StateMachineStore::open(dir.path(), machine(&blobs)).unwrap();
        let (applied, _) = sm.applied_state().await.unwrap();
        assert_eq!(applied, Some(log_id(1, 1)));
        assert!(sm.machine().get_index("films").unwrap().is_case_sensitive());
        assert!(sm.get_current_snapshot().await.unwrap().is_some());
    }
}
