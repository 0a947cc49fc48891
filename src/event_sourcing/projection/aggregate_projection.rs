use async_trait::async_trait;
use std::sync::Arc;

use super::projection::Projection;
use crate::event_sourcing::core::{EventEnvelope, ProjectionError, Rehydrator};
use crate::event_sourcing::repository::EventSourcedRepository;

// ============================================================================
// Aggregate Projection - idempotent "reload and upsert" read-model updates
// ============================================================================
//
// Instead of applying the event as a delta to the read model, the aggregate
// is replayed from the log and its whole state is upserted. Applying the
// same event any number of times converges on the same row.
//
// The loader must be a repository WITHOUT projections, otherwise loading
// would dispatch back into this projection.
//
// ============================================================================

/// Writes the replayed state of an aggregate into a read model.
#[async_trait]
pub trait ReadModelWriter<A>: Send + Sync {
    async fn write(&self, aggregate: &A) -> anyhow::Result<()>;
}

pub struct AggregateProjection<R: Rehydrator> {
    event_type: String,
    loader: EventSourcedRepository<R>,
    writer: Arc<dyn ReadModelWriter<R::Aggregate>>,
}

impl<R: Rehydrator> AggregateProjection<R> {
    pub fn new(
        event_type: &str,
        loader: EventSourcedRepository<R>,
        writer: Arc<dyn ReadModelWriter<R::Aggregate>>,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            loader: loader.without_projections(),
            writer,
        }
    }
}

#[async_trait]
impl<R: Rehydrator> Projection for AggregateProjection<R> {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn project(&self, event: &EventEnvelope) -> Result<(), ProjectionError> {
        let aggregate = self
            .loader
            .load_by_raw_id(&event.aggregate_id)
            .await
            .map_err(|e| ProjectionError::handler(&event.event_type, e))?
            .ok_or_else(|| ProjectionError::AggregateMissing(event.aggregate_id.clone()))?;

        self.writer
            .write(&aggregate)
            .await
            .map_err(|e| ProjectionError::handler(&event.event_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::aggregate::test_fixtures::*;
    use crate::event_sourcing::core::AggregateRoot;
    use crate::event_sourcing::store::{EventStore, InMemoryEventStore};
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct CounterTable {
        rows: RwLock<HashMap<String, i64>>,
    }

    #[async_trait]
    impl ReadModelWriter<Counter> for CounterTable {
        async fn write(&self, counter: &Counter) -> anyhow::Result<()> {
            self.rows.write().await.insert(counter.id.clone(), counter.value);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_projecting_same_event_twice_is_idempotent() {
        let store = Arc::new(InMemoryEventStore::new());
        let table = Arc::new(CounterTable::default());

        let mut counter = Counter::create("c-1");
        counter.increment(7);
        let events = counter.uncommitted_events().to_vec();
        store.append_events(&counter.stream_name(), &events, 0).await.unwrap();

        let projection = AggregateProjection::<CounterRehydrator>::new(
            "CounterIncremented",
            EventSourcedRepository::new(store.clone()),
            table.clone(),
        );

        projection.project(&events[1]).await.unwrap();
        let once = table.rows.read().await.clone();
        projection.project(&events[1]).await.unwrap();
        let twice = table.rows.read().await.clone();

        assert_eq!(once, twice);
        assert_eq!(twice.get("c-1"), Some(&7));
    }

    #[tokio::test]
    async fn test_missing_aggregate_is_reported() {
        let store = Arc::new(InMemoryEventStore::new());
        let projection = AggregateProjection::<CounterRehydrator>::new(
            "CounterIncremented",
            EventSourcedRepository::new(store),
            Arc::new(CounterTable::default()),
        );

        let orphan = EventEnvelope::new("counter", "ghost", "CounterIncremented", serde_json::json!({"by": 1}));
        let result = projection.project(&orphan).await;

        assert!(matches!(result, Err(ProjectionError::AggregateMissing(id)) if id == "ghost"));
    }
}
