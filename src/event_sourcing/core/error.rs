// ============================================================================
// Event Sourcing Errors
// ============================================================================
//
// One enum per port so callers can tell a lost optimistic-concurrency race
// from a corrupt log, a stale read model or a broken backend.
//
// ============================================================================

use crate::utils::retry::IsTransient;

/// Errors raised by a log store backend.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("Concurrency conflict on stream {stream}: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        stream: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to encode or decode event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors raised while rebuilding an aggregate from its log.
#[derive(Debug, thiserror::Error)]
pub enum RehydrateError {
    #[error("No events to replay")]
    EmptyLog,

    #[error("First event must be {expected}, found {found}")]
    InvalidFirstEvent {
        expected: &'static str,
        found: String,
    },

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid payload for {event_type}: {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event {event_type} cannot be applied: {reason}")]
    InvalidState {
        event_type: String,
        reason: String,
    },
}

/// Errors raised by a checkpoint (snapshot) backend.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to encode or decode snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors raised by a projection handler.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Projection for {event_type} failed: {source}")]
    Handler {
        event_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Aggregate not found for projection: {0}")]
    AggregateMissing(String),
}

impl ProjectionError {
    pub fn handler(event_type: &str, source: impl Into<anyhow::Error>) -> Self {
        Self::Handler {
            event_type: event_type.to_string(),
            source: source.into(),
        }
    }
}

/// Errors surfaced by `EventSourcedRepository::save` and `load_by_id`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error("Failed to rehydrate aggregate: {0}")]
    Rehydrate(#[from] RehydrateError),

    /// The events are durably committed up to `committed_version`; only the
    /// read model is behind.
    #[error("Events committed at version {committed_version} but projection failed: {source}")]
    Projection {
        committed_version: u64,
        #[source]
        source: ProjectionError,
    },

}

impl RepositoryError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }

    /// True when the write itself succeeded and only the read model is stale.
    pub fn is_projection_failure(&self) -> bool {
        matches!(self, RepositoryError::Projection { .. })
    }
}

impl IsTransient for RepositoryError {
    /// Only a lost append race is worth retrying after a reload.
    fn is_transient(&self) -> bool {
        self.is_concurrency_conflict()
    }
}
