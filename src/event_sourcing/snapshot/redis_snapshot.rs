use anyhow::Context;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::marker::PhantomData;

use super::snapshot_repository::SnapshotRepository;
use crate::event_sourcing::core::{Snapshot, SnapshotError};

// ============================================================================
// Redis Snapshot Repository
// ============================================================================
//
// Cache-style checkpoint store: one JSON value per aggregate under
// `snapshot:<aggregate_type>:<aggregate_id>`, overwritten on every save.
// Losing the cache only makes the next load a full replay.
//
// ============================================================================

pub struct RedisSnapshotRepository<S: Snapshot> {
    connection: MultiplexedConnection,
    aggregate_type: String, // e.g., "account"
    _phantom: PhantomData<S>,
}

impl<S: Snapshot> RedisSnapshotRepository<S> {
    pub fn new(connection: MultiplexedConnection, aggregate_type: &str) -> Self {
        Self {
            connection,
            aggregate_type: aggregate_type.to_string(),
            _phantom: PhantomData,
        }
    }

    fn key(&self, aggregate_id: &str) -> String {
        snapshot_key(&self.aggregate_type, aggregate_id)
    }
}

pub fn snapshot_key(aggregate_type: &str, aggregate_id: &str) -> String {
    format!("snapshot:{}:{}", aggregate_type, aggregate_id)
}

#[async_trait]
impl<S: Snapshot + 'static> SnapshotRepository<S> for RedisSnapshotRepository<S> {
    async fn save(&self, snapshot: &S) -> Result<(), SnapshotError> {
        let key = self.key(&snapshot.aggregate_id());
        let json = serde_json::to_string(snapshot)?;

        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(&key, json)
            .await
            .with_context(|| format!("Failed to write snapshot {}", key))?;

        tracing::debug!(key = %key, version = snapshot.version(), "Stored snapshot in Redis");
        Ok(())
    }

    async fn get_latest(&self, aggregate_id: &str) -> Result<Option<S>, SnapshotError> {
        let key = self.key(aggregate_id);

        let mut conn = self.connection.clone();
        let json: Option<String> = conn
            .get(&key)
            .await
            .with_context(|| format!("Failed to read snapshot {}", key))?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), SnapshotError> {
        let key = self.key(aggregate_id);

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&key)
            .await
            .with_context(|| format!("Failed to delete snapshot {}", key))?;

        Ok(())
    }
}
