use super::event::{stream_name, DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Business operations validate, change state and record exactly one event
// 3. Recorded events stay in a pending buffer until the repository commits them
// 4. Replay never records anything
//
// This is the GENERIC aggregate trait that works for ANY domain aggregate.
//
// ============================================================================

/// Buffer of events recorded since the aggregate was loaded or created.
///
/// Owned by the aggregate but managed only through these methods, so the
/// repository can read and clear it without reaching into aggregate state.
#[derive(Debug, Clone, Default)]
pub struct PendingEvents {
    events: Vec<EventEnvelope>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a typed event and append it to the buffer.
    pub fn record<E: DomainEvent>(
        &mut self,
        aggregate_type: &str,
        aggregate_id: impl Into<String>,
        event: &E,
    ) -> Result<(), serde_json::Error> {
        let envelope = EventEnvelope::from_domain(aggregate_type, aggregate_id, event)?;
        self.events.push(envelope);
        Ok(())
    }

    pub fn as_slice(&self) -> &[EventEnvelope] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Generic Aggregate trait - all event-sourced aggregates implement this
pub trait AggregateRoot: Send + Sync {
    /// Identity type (e.g. `AccountId`). Its `Display` form is the id used in
    /// stream names and snapshot keys.
    type Id: std::fmt::Display + Clone + Send + Sync;

    /// Aggregate type tag, e.g. "account".
    const AGGREGATE_TYPE: &'static str;

    fn aggregate_id(&self) -> &Self::Id;

    /// Number of committed events this instance reflects.
    fn version(&self) -> u64;

    /// Events recorded but not yet persisted.
    fn uncommitted_events(&self) -> &[EventEnvelope];

    /// Clear the pending buffer and record the committed stream version.
    fn mark_committed(&mut self, version: u64);

    fn stream_name(&self) -> String {
        stream_name(Self::AGGREGATE_TYPE, &self.aggregate_id().to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_create_records_exactly_one_event() {
        let counter = Counter::create("c-1");
        assert_eq!(counter.uncommitted_events().len(), 1);
        assert_eq!(counter.uncommitted_events()[0].event_type, "CounterCreated");
        assert_eq!(counter.version(), 0);
    }

    #[test]
    fn test_each_operation_records_one_event() {
        let mut counter = Counter::create("c-1");
        counter.increment(2);
        counter.increment(3);

        assert_eq!(counter.value, 5);
        assert_eq!(counter.uncommitted_events().len(), 3);
    }

    #[test]
    fn test_mark_committed_clears_buffer() {
        let mut counter = Counter::create("c-1");
        counter.increment(1);
        counter.mark_committed(2);

        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.version(), 2);
    }

    #[test]
    fn test_stream_name_from_aggregate() {
        let counter = Counter::create("c-9");
        assert_eq!(counter.stream_name(), "counter-c-9");
    }
}
