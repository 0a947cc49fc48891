use async_trait::async_trait;

use crate::event_sourcing::core::{EventEnvelope, EventStoreError};

// ============================================================================
// Event Store Port
// ============================================================================
//
// Every backend (in-memory, ScyllaDB, Postgres) satisfies the same contract:
//
// 1. Streams are addressed by name ("<type>-<id>")
// 2. A stream's version is the number of events committed to it (0 if none)
// 3. append_events checks expected_version and writes atomically, or fails
//    with ConcurrencyConflict and writes nothing
// 4. Reads of a stream that was never written return an empty Vec
//
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events to a stream.
    /// Returns the new stream version after appending.
    async fn append_events(
        &self,
        stream_name: &str,
        events: &[EventEnvelope],
        expected_version: u64,
    ) -> Result<u64, EventStoreError>;

    /// Load every event in the stream, in append order.
    async fn read_events(&self, stream_name: &str) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Load only the events at positions strictly greater than `after_version`.
    async fn read_events_after(
        &self,
        stream_name: &str,
        after_version: u64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Number of events committed to the stream so far.
    async fn current_version(&self, stream_name: &str) -> Result<u64, EventStoreError>;

    /// Check if a stream has any events
    async fn stream_exists(&self, stream_name: &str) -> Result<bool, EventStoreError> {
        Ok(self.current_version(stream_name).await? > 0)
    }
}
