use serde::{de::DeserializeOwned, Serialize};

use super::aggregate::AggregateRoot;
use super::error::RehydrateError;
use super::event::EventEnvelope;

// ============================================================================
// Rehydrator - stateless replay logic per aggregate type
// ============================================================================
//
// A rehydrator is a table of associated functions, never instantiated. The
// repository is generic over it, so the fold logic can be unit tested with
// plain vectors of envelopes and no storage at all.
//
// Unknown event types are a hard error here. The projection registry skips
// them instead; command-side state must be rebuilt exactly, read models only
// need to keep working.
//
// ============================================================================

/// Checkpoint of an aggregate's reconstructable state.
pub trait Snapshot: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Id of the owning aggregate, as used in its stream name.
    fn aggregate_id(&self) -> String;

    /// Number of events folded into this state.
    fn version(&self) -> u64;
}

pub trait Rehydrator: Send + Sync + 'static {
    type Aggregate: AggregateRoot;
    type Snapshot: Snapshot;

    /// Event type every stream of this aggregate must start with.
    const CREATION_EVENT: &'static str;

    /// Build initial state from the creation event.
    fn from_creation_event(event: &EventEnvelope) -> Result<Self::Aggregate, RehydrateError>;

    /// Build state straight from checkpoint fields.
    fn from_snapshot(snapshot: &Self::Snapshot) -> Result<Self::Aggregate, RehydrateError>;

    /// Apply one non-creation event. Must fail with `UnknownEventType` for
    /// anything it does not recognise.
    fn apply_event(aggregate: &mut Self::Aggregate, event: &EventEnvelope) -> Result<(), RehydrateError>;

    fn create_snapshot(aggregate: &Self::Aggregate, version: u64) -> Self::Snapshot;

    /// Rebuild from the full log.
    fn rehydrate(events: &[EventEnvelope]) -> Result<Self::Aggregate, RehydrateError> {
        let (first, rest) = events.split_first().ok_or(RehydrateError::EmptyLog)?;

        if first.event_type != Self::CREATION_EVENT {
            return Err(RehydrateError::InvalidFirstEvent {
                expected: Self::CREATION_EVENT,
                found: first.event_type.clone(),
            });
        }

        let mut aggregate = Self::from_creation_event(first)?;
        for event in rest {
            Self::apply_event(&mut aggregate, event)?;
        }

        aggregate.mark_committed(events.len() as u64);
        Ok(aggregate)
    }

    /// Rebuild from a checkpoint plus the events committed after it.
    fn rehydrate_from_snapshot(
        snapshot: &Self::Snapshot,
        events_after: &[EventEnvelope],
    ) -> Result<Self::Aggregate, RehydrateError> {
        let mut aggregate = Self::from_snapshot(snapshot)?;
        for event in events_after {
            Self::apply_event(&mut aggregate, event)?;
        }

        aggregate.mark_committed(snapshot.version() + events_after.len() as u64);
        Ok(aggregate)
    }

    /// Decode an event payload, mapping failures to `InvalidPayload`.
    fn payload<T: DeserializeOwned>(event: &EventEnvelope) -> Result<T, RehydrateError> {
        event.decode().map_err(|source| RehydrateError::InvalidPayload {
            event_type: event.event_type.clone(),
            source,
        })
    }
}
