use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::error::Result;
use crate::models::DocumentId;
use crate::persistence::{document_key, BlobStore};

/// Document ids handed out by the leader, per index.
///
/// An id is consumed as soon as its reservation is dropped, whether or not
/// the entry carrying it was ever confirmed.
#[derive(Default)]
pub struct IdReservations {
    next: DashMap<String, Arc<Mutex<DocumentId>>>,
}

/// Exclusive hold on the next id of one index
pub struct Reservation {
    guard: OwnedMutexGuard<DocumentId>,
    id: DocumentId,
}

impl Reservation {
    pub fn id(&self) -> DocumentId {
        self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        *self.guard = self.id + 1;
    }
}

impl IdReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the first id of `index` that is at least `floor`, was never
    /// reserved before and has no stored body.
    ///
    /// Holds the index's lock until the reservation is dropped.
    pub async fn reserve(
        &self,
        index: &str,
        floor: DocumentId,
        blobs: &dyn BlobStore,
    ) -> Result<Reservation> {
        let slot = self
            .next
            .entry(index.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone();
        let guard = slot.lock_owned().await;

        let mut id = (*guard).max(floor);
        while blobs.exists(&document_key(index, id)).await? {
            warn!(index, doc_id = id, "Document id already has a stored body, skipping it");
            id += 1;
        }
        Ok(Reservation { guard, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::persistence::MemoryBlobStore;

    #[tokio::test]
    async fn test_reservation_starts_at_floor_and_advances() {
        let reservations = IdReservations::new();
        let blobs = MemoryBlobStore::new();

        let first = reservations.reserve("books", 1, &blobs).await.unwrap();
        assert_eq!(first.id(), 1);
        drop(first);

        // The applied counter lags behind what was already handed out.
        let second = reservations.reserve("books", 1, &blobs).await.unwrap();
        assert_eq!(second.id(), 2);
        drop(second);

        let ahead = reservations.reserve("books", 10, &blobs).await.unwrap();
        assert_eq!(ahead.id(), 10);
    }

    #[tokio::test]
    async fn test_id_is_consumed_when_the_write_times_out() {
        let reservations = IdReservations::new();
        let blobs = MemoryBlobStore::new();

        let attempt = async {
            let reservation = reservations.reserve("books", 1, &blobs).await?;
            assert_eq!(reservation.id(), 1);
            Err::<DocumentId, _>(QuarryError::ApplyTimeout(5000))
        };
        assert!(matches!(attempt.await, Err(QuarryError::ApplyTimeout(5000))));

        // The timed-out entry may still commit under id 1.
        let next = reservations.reserve("books", 1, &blobs).await.unwrap();
        assert_eq!(next.id(), 2);
    }

    #[tokio::test]
    async fn test_stored_bodies_are_never_overwritten() {
        let reservations = IdReservations::new();
        let blobs = MemoryBlobStore::new();
        for id in [3, 4] {
            blobs
                .put(&document_key("books", id), b"{\"title\":\"kept\"}".to_vec())
                .await
                .unwrap();
        }

        let reservation = reservations.reserve("books", 3, &blobs).await.unwrap();
        assert_eq!(reservation.id(), 5);
        drop(reservation);

        // Other indices have their own keys and counters.
        let other = reservations.reserve("films", 3, &blobs).await.unwrap();
        assert_eq!(other.id(), 3);
    }

    #[tokio::test]
    async fn test_reservations_of_one_index_are_serialized() {
        let reservations = Arc::new(IdReservations::new());
        let blobs = Arc::new(MemoryBlobStore::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reservations = reservations.clone();
            let blobs = blobs.clone();
            handles.push(tokio::spawn(async move {
                let reservation = reservations.reserve("books", 1, blobs.as_ref()).await.unwrap();
                tokio::task::yield_now().await;
                reservation.id()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}
