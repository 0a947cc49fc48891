use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::event_store::EventStore;
use crate::event_sourcing::core::{EventEnvelope, EventStoreError};

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Test backend. Not durable.
//
// Each stream has its own mutex; the version check and the push happen under
// that lock, so concurrent writers to one stream are serialised while writers
// to different streams never contend.
//
// ============================================================================

type Stream = Arc<Mutex<Vec<EventEnvelope>>>;

#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Stream>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn stream(&self, stream_name: &str) -> Option<Stream> {
        self.streams.read().await.get(stream_name).cloned()
    }

    async fn stream_or_create(&self, stream_name: &str) -> Stream {
        if let Some(stream) = self.stream(stream_name).await {
            return stream;
        }

        self.streams
            .write()
            .await
            .entry(stream_name.to_string())
            .or_default()
            .clone()
    }

    /// Drop all streams.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }

    pub async fn stream_names(&self) -> Vec<String> {
        self.streams.read().await.keys().cloned().collect()
    }

    pub async fn event_count(&self, stream_name: &str) -> usize {
        match self.stream(stream_name).await {
            Some(stream) => stream.lock().await.len(),
            None => 0,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_events(
        &self,
        stream_name: &str,
        events: &[EventEnvelope],
        expected_version: u64,
    ) -> Result<u64, EventStoreError> {
        // A stream only comes into existence with its first successful append.
        let stream = match self.stream(stream_name).await {
            Some(stream) => stream,
            None if expected_version != 0 => return Err(conflict(stream_name, expected_version, 0)),
            None if events.is_empty() => return Ok(0),
            None => self.stream_or_create(stream_name).await,
        };
        let mut stored = stream.lock().await;

        let current_version = stored.len() as u64;
        if current_version != expected_version {
            return Err(conflict(stream_name, expected_version, current_version));
        }

        stored.extend_from_slice(events);
        let new_version = stored.len() as u64;

        tracing::debug!(
            stream = %stream_name,
            new_version,
            event_count = events.len(),
            "Appended events to in-memory stream"
        );

        Ok(new_version)
    }

    async fn read_events(&self, stream_name: &str) -> Result<Vec<EventEnvelope>, EventStoreError> {
        match self.stream(stream_name).await {
            Some(stream) => Ok(stream.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn read_events_after(
        &self,
        stream_name: &str,
        after_version: u64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let Some(stream) = self.stream(stream_name).await else {
            return Ok(Vec::new());
        };

        let stored = stream.lock().await;
        let skip = usize::try_from(after_version).unwrap_or(usize::MAX);
        Ok(stored.iter().skip(skip).cloned().collect())
    }

    async fn current_version(&self, stream_name: &str) -> Result<u64, EventStoreError> {
        Ok(self.event_count(stream_name).await as u64)
    }
}

fn conflict(stream_name: &str, expected_version: u64, current_version: u64) -> EventStoreError {
    tracing::warn!(
        stream = %stream_name,
        expected_version,
        current_version,
        "Rejected append: concurrency conflict"
    );
    EventStoreError::ConcurrencyConflict {
        stream: stream_name.to_string(),
        expected: expected_version,
        actual: current_version,
    }
}
