use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::event_store::EventStore;
use crate::event_sourcing::core::{EventEnvelope, EventStoreError};

// ============================================================================
// ScyllaDB Event Store
// ============================================================================
//
// One partition per stream. Events are clustered by sequence_number and the
// partition carries a static `stream_version` column.
//
// Appends are a conditional (LWT) batch confined to that single partition:
// the `IF stream_version = ?` guard and every event INSERT are applied
// together or not at all. Two writers racing on the same expected version
// can never both succeed.
//
// ============================================================================

type EventRow = (i64, Uuid, String, String, String, String, String, DateTime<Utc>);

const SELECT_COLUMNS: &str = "sequence_number, event_id, event_type, aggregate_id, aggregate_type,
                              event_data, metadata, occurred_at";

pub struct ScyllaEventStore {
    session: Arc<Session>,
}

impl ScyllaEventStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the event table in the session's current keyspace.
    pub async fn create_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS event_streams (
                    stream_name text,
                    sequence_number bigint,
                    stream_version bigint static,
                    event_id uuid,
                    event_type text,
                    aggregate_id text,
                    aggregate_type text,
                    event_data text,
                    metadata text,
                    occurred_at timestamp,
                    PRIMARY KEY (stream_name, sequence_number)
                ) WITH CLUSTERING ORDER BY (sequence_number ASC)",
                &[],
            )
            .await
            .context("Failed to create event_streams table")?;

        tracing::info!("event_streams table ready");
        Ok(())
    }

    async fn query_events(
        &self,
        stream_name: &str,
        after_version: Option<u64>,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let result = match after_version {
            None => self
                .session
                .query_unpaged(
                    format!(
                        "SELECT {} FROM event_streams WHERE stream_name = ? ORDER BY sequence_number ASC",
                        SELECT_COLUMNS
                    ),
                    (stream_name,),
                )
                .await,
            Some(after) => self
                .session
                .query_unpaged(
                    format!(
                        "SELECT {} FROM event_streams
                         WHERE stream_name = ? AND sequence_number > ?
                         ORDER BY sequence_number ASC",
                        SELECT_COLUMNS
                    ),
                    (stream_name, to_cql_version(after)?),
                )
                .await,
        }
        .context("Failed to query event_streams")?;

        let mut events = Vec::new();

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(events), // No rows
        };

        for row in rows_result.rows::<EventRow>().context("Failed to read event rows")? {
            let row = row.context("Failed to deserialize event row")?;
            events.push(envelope_from_row(row)?);
        }

        tracing::debug!(stream = %stream_name, count = events.len(), "Loaded events from ScyllaDB");
        Ok(events)
    }
}

#[async_trait]
impl EventStore for ScyllaEventStore {
    async fn append_events(
        &self,
        stream_name: &str,
        events: &[EventEnvelope],
        expected_version: u64,
    ) -> Result<u64, EventStoreError> {
        if events.is_empty() {
            return Ok(expected_version);
        }

        let new_version = expected_version + events.len() as u64;

        let mut batch = Batch::default();
        let mut values: Vec<Box<dyn scylla::serialize::row::SerializeRow + Send + Sync>> = vec![];

        // Version guard first: the whole batch is conditional on it
        if expected_version == 0 {
            batch.append_statement(
                "UPDATE event_streams SET stream_version = ? WHERE stream_name = ? IF stream_version = null",
            );
            values.push(Box::new((to_cql_version(new_version)?, stream_name.to_string())));
        } else {
            batch.append_statement(
                "UPDATE event_streams SET stream_version = ? WHERE stream_name = ? IF stream_version = ?",
            );
            values.push(Box::new((
                to_cql_version(new_version)?,
                stream_name.to_string(),
                to_cql_version(expected_version)?,
            )));
        }

        let mut sequence = expected_version;
        for envelope in events {
            sequence += 1;

            batch.append_statement(
                "INSERT INTO event_streams (
                    stream_name, sequence_number, event_id, event_type, aggregate_id,
                    aggregate_type, event_data, metadata, occurred_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            );

            values.push(Box::new((
                stream_name.to_string(),
                to_cql_version(sequence)?,
                envelope.event_id,
                envelope.event_type.clone(),
                envelope.aggregate_id.clone(),
                envelope.aggregate_type.clone(),
                serde_json::to_string(&envelope.data)?,
                serde_json::to_string(&envelope.metadata)?,
                envelope.occurred_at,
            )));
        }

        let result = self
            .session
            .batch(&batch, values)
            .await
            .context("Failed to execute conditional append batch")?;

        let applied = result
            .into_rows_result()
            .context("Conditional batch returned no [applied] row")?
            .first_row::<Row>()
            .context("Failed to read [applied] row")
            .and_then(|row| lwt_applied(&row))?;

        if !applied {
            let actual = self.current_version(stream_name).await?;
            tracing::warn!(
                stream = %stream_name,
                expected_version,
                current_version = actual,
                "Rejected append: concurrency conflict"
            );
            return Err(EventStoreError::ConcurrencyConflict {
                stream: stream_name.to_string(),
                expected: expected_version,
                actual,
            });
        }

        tracing::info!(
            stream = %stream_name,
            new_version,
            event_count = events.len(),
            "✅ Appended events to event store"
        );

        Ok(new_version)
    }

    async fn read_events(&self, stream_name: &str) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.query_events(stream_name, None).await
    }

    async fn read_events_after(
        &self,
        stream_name: &str,
        after_version: u64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.query_events(stream_name, Some(after_version)).await
    }

    async fn current_version(&self, stream_name: &str) -> Result<u64, EventStoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT stream_version FROM event_streams WHERE stream_name = ? LIMIT 1",
                (stream_name,),
            )
            .await
            .context("Failed to query stream version")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(0), // No rows = new stream
        };

        match rows_result.maybe_first_row::<(Option<i64>,)>() {
            Ok(Some((Some(version),))) => Ok(u64::try_from(version).unwrap_or(0)),
            _ => Ok(0), // No rows = new stream
        }
    }
}

fn to_cql_version(version: u64) -> Result<i64, EventStoreError> {
    i64::try_from(version)
        .map_err(|_| EventStoreError::Backend(anyhow!("Stream version {} exceeds bigint", version)))
}

/// The first column of an LWT result is always `[applied]`.
fn lwt_applied(row: &Row) -> anyhow::Result<bool> {
    match row.columns.first() {
        Some(Some(CqlValue::Boolean(applied))) => Ok(*applied),
        other => Err(anyhow!("Unexpected [applied] column: {:?}", other)),
    }
}

fn envelope_from_row(row: EventRow) -> Result<EventEnvelope, EventStoreError> {
    let (_sequence, event_id, event_type, aggregate_id, aggregate_type, data_json, metadata_json, occurred_at) = row;

    let metadata: HashMap<String, serde_json::Value> = if metadata_json.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_str(&metadata_json)?
    };

    Ok(EventEnvelope {
        event_id,
        event_type,
        aggregate_id,
        aggregate_type,
        occurred_at,
        data: serde_json::from_str(&data_json)?,
        metadata,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Appends and reads against a live cluster are integration concerns; these
// cover the row mapping and guards that need no session.
//
// ============================================================================
