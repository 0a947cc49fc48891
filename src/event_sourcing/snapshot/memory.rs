use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::snapshot_repository::SnapshotRepository;
use crate::event_sourcing::core::{Snapshot, SnapshotError};

/// In-memory checkpoint store for tests and single-process demos.
pub struct InMemorySnapshotRepository<S> {
    snapshots: RwLock<HashMap<String, S>>,
}

impl<S> Default for InMemorySnapshotRepository<S> {
    fn default() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: Snapshot> InMemorySnapshotRepository<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn clear(&self) {
        self.snapshots.write().await.clear();
    }
}

#[async_trait]
impl<S: Snapshot + 'static> SnapshotRepository<S> for InMemorySnapshotRepository<S> {
    async fn save(&self, snapshot: &S) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.aggregate_id(), snapshot.clone());
        Ok(())
    }

    async fn get_latest(&self, aggregate_id: &str) -> Result<Option<S>, SnapshotError> {
        Ok(self.snapshots.read().await.get(aggregate_id).cloned())
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), SnapshotError> {
        self.snapshots.write().await.remove(aggregate_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::aggregate::test_fixtures::CounterSnapshot;

    fn snapshot(id: &str, version: u64) -> CounterSnapshot {
        CounterSnapshot { id: id.to_string(), value: version as i64 * 10, version }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let repo = InMemorySnapshotRepository::<CounterSnapshot>::new();
        assert!(repo.get_latest("c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous() {
        let repo = InMemorySnapshotRepository::new();
        repo.save(&snapshot("c-1", 100)).await.unwrap();
        repo.save(&snapshot("c-1", 200)).await.unwrap();

        let latest = repo.get_latest("c-1").await.unwrap().unwrap();
        assert_eq!(latest.version, 200);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let repo = InMemorySnapshotRepository::new();
        repo.save(&snapshot("c-1", 100)).await.unwrap();
        repo.save(&snapshot("c-2", 100)).await.unwrap();

        repo.delete("c-1").await.unwrap();
        assert!(repo.get_latest("c-1").await.unwrap().is_none());
        // Deleting twice is fine
        repo.delete("c-1").await.unwrap();

        repo.clear().await;
        assert_eq!(repo.count().await, 0);
    }
}
