use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use std::marker::PhantomData;
use std::sync::Arc;

use super::snapshot_repository::SnapshotRepository;
use crate::event_sourcing::core::{Snapshot, SnapshotError};

// ============================================================================
// ScyllaDB Snapshot Repository
// ============================================================================
//
// Keeps only the latest checkpoint per aggregate: the row is keyed by
// (aggregate_type, aggregate_id) so every save overwrites the previous one.
//
// ============================================================================

pub struct ScyllaSnapshotRepository<S: Snapshot> {
    session: Arc<Session>,
    aggregate_type: String,
    _phantom: PhantomData<S>,
}

impl<S: Snapshot> ScyllaSnapshotRepository<S> {
    pub fn new(session: Arc<Session>, aggregate_type: &str) -> Self {
        Self {
            session,
            aggregate_type: aggregate_type.to_string(),
            _phantom: PhantomData,
        }
    }

    pub async fn create_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS snapshots (
                    aggregate_type text,
                    aggregate_id text,
                    version bigint,
                    state text,
                    created_at timestamp,
                    PRIMARY KEY ((aggregate_type, aggregate_id))
                )",
                &[],
            )
            .await
            .context("Failed to create snapshots table")?;

        Ok(())
    }
}

#[async_trait]
impl<S: Snapshot + 'static> SnapshotRepository<S> for ScyllaSnapshotRepository<S> {
    async fn save(&self, snapshot: &S) -> Result<(), SnapshotError> {
        let state = serde_json::to_string(snapshot)?;
        let version = i64::try_from(snapshot.version())
            .context("Snapshot version exceeds bigint")?;

        self.session
            .query_unpaged(
                "INSERT INTO snapshots (aggregate_type, aggregate_id, version, state, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    self.aggregate_type.as_str(),
                    snapshot.aggregate_id(),
                    version,
                    state,
                    Utc::now(),
                ),
            )
            .await
            .context("Failed to write snapshot")?;

        tracing::debug!(
            aggregate_type = %self.aggregate_type,
            aggregate_id = %snapshot.aggregate_id(),
            version = snapshot.version(),
            "Stored snapshot in ScyllaDB"
        );

        Ok(())
    }

    async fn get_latest(&self, aggregate_id: &str) -> Result<Option<S>, SnapshotError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT state FROM snapshots WHERE aggregate_type = ? AND aggregate_id = ?",
                (self.aggregate_type.as_str(), aggregate_id),
            )
            .await
            .context("Failed to read snapshot")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(String,)>() {
            Ok(Some((state,))) => Ok(Some(serde_json::from_str(&state)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(SnapshotError::Backend(
                anyhow::Error::new(e).context("Failed to deserialize snapshot row"),
            )),
        }
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), SnapshotError> {
        self.session
            .query_unpaged(
                "DELETE FROM snapshots WHERE aggregate_type = ? AND aggregate_id = ?",
                (self.aggregate_type.as_str(), aggregate_id),
            )
            .await
            .context("Failed to delete snapshot")?;

        Ok(())
    }
}
