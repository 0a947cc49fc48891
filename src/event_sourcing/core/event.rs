use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;

// ============================================================================
// Event Envelope - a committed (or about-to-be-committed) fact
// ============================================================================
//
// The payload is kept as raw JSON so the log never needs to know the shape
// of any aggregate's events. Typed access goes through `DomainEvent`.
//
// ============================================================================

/// A single immutable fact about one aggregate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    // Event Identity
    pub event_id: Uuid,
    pub event_type: String,

    // Owning aggregate
    pub aggregate_id: String,
    pub aggregate_type: String,

    /// Millisecond precision, the finest every log backend stores, so a fact
    /// reads back equal to the one appended.
    pub occurred_at: DateTime<Utc>,

    // Event Payload
    pub data: Value,

    // Additional Metadata (correlation, causation, actor, ...)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl EventEnvelope {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Utc::now().trunc_subsecs(3),
            data,
            metadata: HashMap::new(),
        }
    }

    /// Wrap a typed domain event, tagging it with the event's own type name.
    pub fn from_domain<E: DomainEvent>(
        aggregate_type: &str,
        aggregate_id: impl Into<String>,
        event: &E,
    ) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_value(event)?;
        Ok(Self::new(aggregate_type, aggregate_id, event.event_type(), data))
    }

    /// Decode the payload into a concrete event struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_correlation(self, correlation_id: Uuid) -> Self {
        self.with_metadata("correlation_id", Value::String(correlation_id.to_string()))
    }

    pub fn with_causation(self, causation_id: Uuid) -> Self {
        self.with_metadata("causation_id", Value::String(causation_id.to_string()))
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.metadata
            .get("correlation_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Typed payload of a fact.
///
/// `event_type` is the tag persisted next to the payload; it is what the
/// rehydrators and the projection registry route on, so existing values must
/// never change.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
}

/// Deterministic stream name for one aggregate instance, e.g. `account-<uuid>`.
pub fn stream_name(aggregate_type: &str, aggregate_id: &str) -> String {
    format!("{}-{}", aggregate_type, aggregate_id)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct TestEvent {
        amount: i64,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str { "TestEvent" }
    }

    #[test]
    fn test_from_domain_tags_event_type() {
        let event = TestEvent { amount: 42 };
        let envelope = EventEnvelope::from_domain("counter", "c-1", &event).unwrap();

        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.aggregate_type, "counter");
        assert_eq!(envelope.aggregate_id, "c-1");
        assert_eq!(envelope.decode::<TestEvent>().unwrap(), event);
    }

    #[test]
    fn test_correlation_metadata() {
        let correlation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new("counter", "c-1", "TestEvent", serde_json::json!({}))
            .with_correlation(correlation_id)
            .with_causation(Uuid::new_v4());

        assert_eq!(envelope.correlation_id(), Some(correlation_id));
        assert!(envelope.metadata.contains_key("causation_id"));
    }

    #[test]
    fn test_envelope_survives_storage_encoding() {
        let envelope = EventEnvelope::new("counter", "c-1", "TestEvent", serde_json::json!({"amount": 7}))
            .with_metadata("user", serde_json::json!("alice"));

        let json = serde_json::to_string(&envelope).unwrap();
        let restored: EventEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, envelope);
    }

    #[test]
    fn test_occurred_at_survives_millisecond_storage() {
        let envelope = EventEnvelope::new("counter", "c-1", "TestEvent", serde_json::json!({}));

        // CQL `timestamp` keeps milliseconds, TIMESTAMPTZ keeps microseconds
        let as_millis = DateTime::from_timestamp_millis(envelope.occurred_at.timestamp_millis()).unwrap();
        let as_micros = DateTime::from_timestamp_micros(envelope.occurred_at.timestamp_micros()).unwrap();

        assert_eq!(as_millis, envelope.occurred_at);
        assert_eq!(as_micros, envelope.occurred_at);
    }

    #[test]
    fn test_stream_name_is_type_dash_id() {
        assert_eq!(stream_name("account", "123"), "account-123");
        assert_ne!(stream_name("account", "1"), stream_name("order", "1"));
    }

    #[test]
    fn test_decode_wrong_shape_fails() {
        let envelope = EventEnvelope::new("counter", "c-1", "TestEvent", serde_json::json!({"nope": true}));
        assert!(envelope.decode::<TestEvent>().is_err());
    }
}
