use async_trait::async_trait;

use crate::event_sourcing::core::{Snapshot, SnapshotError};

/// Latest-checkpoint storage, one entry per aggregate.
///
/// A missing checkpoint is always valid: callers fall back to full replay.
#[async_trait]
pub trait SnapshotRepository<S: Snapshot>: Send + Sync {
    /// Store `snapshot` as the latest checkpoint for its aggregate.
    async fn save(&self, snapshot: &S) -> Result<(), SnapshotError>;

    async fn get_latest(&self, aggregate_id: &str) -> Result<Option<S>, SnapshotError>;

    async fn delete(&self, aggregate_id: &str) -> Result<(), SnapshotError>;
}
