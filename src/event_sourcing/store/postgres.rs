//! Postgres-backed event store.
//!
//! The version check and the event inserts run in one transaction. The
//! stream row is locked with `FOR UPDATE`; a writer that races on a brand new
//! stream, or slips past the lock, trips the `(stream_name, version)` primary
//! key instead. Both paths surface as `ConcurrencyConflict`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::event_store::EventStore;
use crate::event_sourcing::core::{EventEnvelope, EventStoreError};

type EventRow = (Uuid, String, String, String, DateTime<Utc>, serde_json::Value, serde_json::Value);

#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_streams (
                stream_name TEXT PRIMARY KEY,
                version     BIGINT NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create event_streams table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                stream_name    TEXT NOT NULL,
                version        BIGINT NOT NULL,
                event_id       UUID NOT NULL,
                event_type     TEXT NOT NULL,
                aggregate_id   TEXT NOT NULL,
                aggregate_type TEXT NOT NULL,
                occurred_at    TIMESTAMPTZ NOT NULL,
                data           JSONB NOT NULL,
                metadata       JSONB NOT NULL,
                PRIMARY KEY (stream_name, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create events table")?;

        Ok(())
    }

    async fn conflict(&self, stream_name: &str, expected: u64) -> EventStoreError {
        let actual = match self.current_version(stream_name).await {
            Ok(version) => version,
            Err(e) => return e,
        };

        tracing::warn!(
            stream = %stream_name,
            expected_version = expected,
            current_version = actual,
            "Rejected append: concurrency conflict"
        );

        EventStoreError::ConcurrencyConflict {
            stream: stream_name.to_string(),
            expected,
            actual,
        }
    }

    async fn try_append(
        &self,
        stream_name: &str,
        events: &[EventEnvelope],
        expected_version: u64,
    ) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (i64,)>(
            "SELECT version FROM event_streams WHERE stream_name = $1 FOR UPDATE",
        )
        .bind(stream_name)
        .fetch_optional(&mut *tx)
        .await?;

        let current_version = current.map(|(v,)| v as u64).unwrap_or(0);
        if current_version != expected_version {
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        let new_version = expected_version + events.len() as u64;

        if current.is_none() {
            sqlx::query(
                "INSERT INTO event_streams (stream_name, version, updated_at) VALUES ($1, $2, $3)",
            )
            .bind(stream_name)
            .bind(new_version as i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE event_streams SET version = $2, updated_at = $3 WHERE stream_name = $1")
                .bind(stream_name)
                .bind(new_version as i64)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }

        for (offset, envelope) in events.iter().enumerate() {
            let metadata = serde_json::to_value(&envelope.metadata)
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

            sqlx::query(
                r#"
                INSERT INTO events (
                    stream_name, version, event_id, event_type, aggregate_id,
                    aggregate_type, occurred_at, data, metadata
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(stream_name)
            .bind((expected_version + offset as u64 + 1) as i64)
            .bind(envelope.event_id)
            .bind(&envelope.event_type)
            .bind(&envelope.aggregate_id)
            .bind(&envelope.aggregate_type)
            .bind(envelope.occurred_at)
            .bind(&envelope.data)
            .bind(metadata)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(new_version))
    }

    async fn select_events(
        &self,
        stream_name: &str,
        after_version: u64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, event_type, aggregate_id, aggregate_type, occurred_at, data, metadata
            FROM events
            WHERE stream_name = $1 AND version > $2
            ORDER BY version ASC
            "#,
        )
        .bind(stream_name)
        .bind(after_version as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read events")?;

        rows.into_iter().map(envelope_from_row).collect()
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append_events(
        &self,
        stream_name: &str,
        events: &[EventEnvelope],
        expected_version: u64,
    ) -> Result<u64, EventStoreError> {
        if events.is_empty() {
            return Ok(expected_version);
        }

        match self.try_append(stream_name, events, expected_version).await {
            Ok(Some(new_version)) => {
                tracing::info!(
                    stream = %stream_name,
                    new_version,
                    event_count = events.len(),
                    "✅ Appended events to event store"
                );
                Ok(new_version)
            }
            Ok(None) => Err(self.conflict(stream_name, expected_version).await),
            Err(e) if is_unique_violation(&e) => Err(self.conflict(stream_name, expected_version).await),
            Err(e) => Err(EventStoreError::Backend(
                anyhow::Error::new(e).context(format!("Failed to append to stream {}", stream_name)),
            )),
        }
    }

    async fn read_events(&self, stream_name: &str) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.select_events(stream_name, 0).await
    }

    async fn read_events_after(
        &self,
        stream_name: &str,
        after_version: u64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.select_events(stream_name, after_version).await
    }

    async fn current_version(&self, stream_name: &str) -> Result<u64, EventStoreError> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT version FROM event_streams WHERE stream_name = $1")
            .bind(stream_name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read stream version")?;

        Ok(row.map(|(v,)| v as u64).unwrap_or(0))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn envelope_from_row(row: EventRow) -> Result<EventEnvelope, EventStoreError> {
    let (event_id, event_type, aggregate_id, aggregate_type, occurred_at, data, metadata) = row;

    let metadata: HashMap<String, serde_json::Value> = match metadata {
        serde_json::Value::Null => HashMap::new(),
        other => serde_json::from_value(other)?,
    };

    Ok(EventEnvelope {
        event_id,
        event_type,
        aggregate_id,
        aggregate_type,
        occurred_at,
        data,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(metadata: serde_json::Value) -> EventRow {
        (
            Uuid::new_v4(),
            "AccountCreated".to_string(),
            "acc-1".to_string(),
            "account".to_string(),
            Utc::now(),
            json!({"initial_balance": 0}),
            metadata,
        )
    }

    #[test]
    fn test_row_maps_to_envelope() {
        let envelope = envelope_from_row(row(json!({"correlation_id": "abc"}))).unwrap();

        assert_eq!(envelope.event_type, "AccountCreated");
        assert_eq!(envelope.aggregate_type, "account");
        assert_eq!(envelope.data["initial_balance"], 0);
        assert_eq!(envelope.metadata["correlation_id"], "abc");
    }

    #[test]
    fn test_null_metadata_maps_to_empty() {
        let envelope = envelope_from_row(row(serde_json::Value::Null)).unwrap();
        assert!(envelope.metadata.is_empty());
    }

    #[test]
    fn test_non_object_metadata_is_rejected() {
        let result = envelope_from_row(row(json!([1, 2, 3])));
        assert!(matches!(result, Err(EventStoreError::Serialization(_))));
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
