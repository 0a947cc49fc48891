use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::event_sourcing::core::{
    stream_name, AggregateRoot, EventEnvelope, EventStoreError, ProjectionError, RepositoryError,
    Rehydrator, Snapshot,
};
use crate::event_sourcing::projection::ProjectionRegistry;
use crate::event_sourcing::snapshot::SnapshotRepository;
use crate::event_sourcing::store::EventStore;
use crate::metrics::{RepositoryMetrics, LOAD_PATH_FULL_REPLAY, LOAD_PATH_SNAPSHOT};

// ============================================================================
// Event Sourced Repository - persistence orchestrator
// ============================================================================
//
// save:
//   1. drain the aggregate's pending events (no-op if none)
//   2. append with expected version = aggregate.version()
//   3. dispatch each appended event to the projection registry, in order
//   4. write a snapshot when the new version is a multiple of the interval
//   5. mark the aggregate committed
//
// load_by_id:
//   latest snapshot + events after it, or full replay, or None.
//
// The repository never serialises callers. Two saves racing on one stream
// are arbitrated by the event store: one wins, the other gets
// ConcurrencyConflict and must reload.
//
// Snapshot failures are logged and counted but never fail a save or a load.
//
// ============================================================================

pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 100;

type SnapshotStore<R> = Arc<dyn SnapshotRepository<<R as Rehydrator>::Snapshot>>;

pub struct EventSourcedRepository<R: Rehydrator> {
    event_store: Arc<dyn EventStore>,
    projections: Option<Arc<ProjectionRegistry>>,
    snapshots: Option<SnapshotStore<R>>,
    snapshot_interval: u64,
    metrics: Option<Arc<RepositoryMetrics>>,
    _rehydrator: PhantomData<fn() -> R>,
}

impl<R: Rehydrator> Clone for EventSourcedRepository<R> {
    fn clone(&self) -> Self {
        Self {
            event_store: self.event_store.clone(),
            projections: self.projections.clone(),
            snapshots: self.snapshots.clone(),
            snapshot_interval: self.snapshot_interval,
            metrics: self.metrics.clone(),
            _rehydrator: PhantomData,
        }
    }
}

impl<R: Rehydrator> EventSourcedRepository<R> {
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            projections: None,
            snapshots: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            metrics: None,
            _rehydrator: PhantomData,
        }
    }

    pub fn with_projections(mut self, projections: Arc<ProjectionRegistry>) -> Self {
        self.projections = Some(projections);
        self
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotStore<R>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Zero is treated as 1.
    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RepositoryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Same backends, no read-model dispatch. Used as the loader of
    /// aggregate projections.
    pub fn without_projections(mut self) -> Self {
        self.projections = None;
        self
    }

    pub fn snapshot_interval(&self) -> u64 {
        self.snapshot_interval
    }

    fn aggregate_type() -> &'static str {
        <R::Aggregate as AggregateRoot>::AGGREGATE_TYPE
    }

    /// Persist the aggregate's pending events and return the committed
    /// stream version.
    ///
    /// On `RepositoryError::Projection` the events ARE committed; the
    /// aggregate keeps its pending buffer and must be reloaded before reuse.
    pub async fn save(&self, aggregate: &mut R::Aggregate) -> Result<u64, RepositoryError> {
        let events = aggregate.uncommitted_events();
        if events.is_empty() {
            return Ok(aggregate.version());
        }

        let stream = aggregate.stream_name();
        let expected_version = aggregate.version();
        let event_count = events.len();

        let new_version = match self
            .event_store
            .append_events(&stream, events, expected_version)
            .await
        {
            Ok(version) => version,
            Err(e) => {
                if matches!(e, EventStoreError::ConcurrencyConflict { .. }) {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_conflict(Self::aggregate_type());
                    }
                }
                return Err(e.into());
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_append(Self::aggregate_type(), event_count);
        }

        tracing::info!(
            stream = %stream,
            expected_version = expected_version,
            new_version = new_version,
            event_count = event_count,
            "Committed events"
        );

        let projected = self.dispatch(events).await;

        self.maybe_snapshot(aggregate, new_version).await;

        if let Err(source) = projected {
            return Err(RepositoryError::Projection {
                committed_version: new_version,
                source,
            });
        }

        aggregate.mark_committed(new_version);
        Ok(new_version)
    }

    async fn dispatch(&self, events: &[EventEnvelope]) -> Result<(), ProjectionError> {
        let Some(registry) = &self.projections else {
            return Ok(());
        };

        for event in events {
            if let Err(e) = registry.project(event).await {
                tracing::error!(
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    error = %e,
                    "Projection failed, read model is behind"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_projection_failure(&event.event_type);
                }
                return Err(e);
            }
        }

        Ok(())
    }

    async fn maybe_snapshot(&self, aggregate: &R::Aggregate, version: u64) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        if version == 0 || version % self.snapshot_interval != 0 {
            return;
        }

        let snapshot = R::create_snapshot(aggregate, version);
        match snapshots.save(&snapshot).await {
            Ok(()) => {
                tracing::info!(
                    aggregate_type = Self::aggregate_type(),
                    aggregate_id = %snapshot.aggregate_id(),
                    version = version,
                    "Snapshot written"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_snapshot_written(Self::aggregate_type());
                }
            }
            Err(e) => {
                tracing::warn!(
                    aggregate_type = Self::aggregate_type(),
                    aggregate_id = %snapshot.aggregate_id(),
                    version = version,
                    error = %e,
                    "Snapshot write failed, continuing without it"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_snapshot_failure(Self::aggregate_type(), "save");
                }
            }
        }
    }

    /// Rebuild an aggregate. `Ok(None)` when it has never been saved.
    pub async fn load_by_id(
        &self,
        id: &<R::Aggregate as AggregateRoot>::Id,
    ) -> Result<Option<R::Aggregate>, RepositoryError> {
        self.load_by_raw_id(&id.to_string()).await
    }

    /// Same as `load_by_id`, keyed by the id's string form as it appears in
    /// envelopes and stream names.
    pub async fn load_by_raw_id(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<R::Aggregate>, RepositoryError> {
        let started = Instant::now();
        let stream = stream_name(Self::aggregate_type(), aggregate_id);

        if let Some(snapshot) = self.latest_snapshot(aggregate_id).await {
            let events_after = self
                .event_store
                .read_events_after(&stream, snapshot.version())
                .await?;
            let aggregate = R::rehydrate_from_snapshot(&snapshot, &events_after)?;

            tracing::debug!(
                stream = %stream,
                snapshot_version = snapshot.version(),
                replayed = events_after.len(),
                "Loaded aggregate from snapshot"
            );
            self.record_load(LOAD_PATH_SNAPSHOT, started);
            return Ok(Some(aggregate));
        }

        let events = self.event_store.read_events(&stream).await?;
        if events.is_empty() {
            tracing::debug!(stream = %stream, "Aggregate not found");
            return Ok(None);
        }

        let aggregate = R::rehydrate(&events)?;

        tracing::debug!(stream = %stream, replayed = events.len(), "Loaded aggregate from full log");
        self.record_load(LOAD_PATH_FULL_REPLAY, started);
        Ok(Some(aggregate))
    }

    async fn latest_snapshot(&self, aggregate_id: &str) -> Option<R::Snapshot> {
        let snapshots = self.snapshots.as_ref()?;

        match snapshots.get_latest(aggregate_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    aggregate_type = Self::aggregate_type(),
                    aggregate_id = %aggregate_id,
                    error = %e,
                    "Snapshot read failed, falling back to full replay"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_snapshot_failure(Self::aggregate_type(), "load");
                }
                None
            }
        }
    }

    fn record_load(&self, path: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_load(Self::aggregate_type(), path, started.elapsed().as_secs_f64());
        }
    }

    pub async fn exists(
        &self,
        id: &<R::Aggregate as AggregateRoot>::Id,
    ) -> Result<bool, RepositoryError> {
        let stream = stream_name(Self::aggregate_type(), &id.to_string());
        Ok(self.event_store.stream_exists(&stream).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::aggregate::test_fixtures::*;
    use crate::event_sourcing::core::SnapshotError;
    use crate::event_sourcing::projection::Projection;
    use crate::event_sourcing::snapshot::InMemorySnapshotRepository;
    use crate::event_sourcing::store::InMemoryEventStore;
    use async_trait::async_trait;

    fn repository(store: Arc<InMemoryEventStore>) -> EventSourcedRepository<CounterRehydrator> {
        EventSourcedRepository::new(store)
    }

    struct FailingProjection;

    #[async_trait]
    impl Projection for FailingProjection {
        fn event_type(&self) -> &str {
            "CounterIncremented"
        }

        async fn project(&self, event: &EventEnvelope) -> Result<(), ProjectionError> {
            Err(ProjectionError::handler(&event.event_type, anyhow::anyhow!("read model offline")))
        }
    }

    struct BrokenSnapshots;

    #[async_trait]
    impl SnapshotRepository<CounterSnapshot> for BrokenSnapshots {
        async fn save(&self, _snapshot: &CounterSnapshot) -> Result<(), SnapshotError> {
            Err(SnapshotError::Backend(anyhow::anyhow!("cache unavailable")))
        }

        async fn get_latest(&self, _aggregate_id: &str) -> Result<Option<CounterSnapshot>, SnapshotError> {
            Err(SnapshotError::Backend(anyhow::anyhow!("cache unavailable")))
        }

        async fn delete(&self, _aggregate_id: &str) -> Result<(), SnapshotError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = Arc::new(InMemoryEventStore::new());
        let repo = repository(store.clone());

        let mut counter = Counter::create("c-1");
        counter.increment(1000);
        let version = repo.save(&mut counter).await.unwrap();

        assert_eq!(version, 2);
        assert_eq!(counter.version(), 2);
        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(store.event_count("counter-c-1").await, 2);

        let loaded = repo.load_by_id(&"c-1".to_string()).await.unwrap().unwrap();
        assert_eq!(loaded.value, 1000);
        assert_eq!(loaded.version(), 2);
    }

    #[tokio::test]
    async fn test_save_without_pending_events_is_noop() {
        let store = Arc::new(InMemoryEventStore::new());
        let repo = repository(store.clone());

        let mut counter = Counter::create("c-1");
        repo.save(&mut counter).await.unwrap();
        let version = repo.save(&mut counter).await.unwrap();

        assert_eq!(version, 1);
        assert_eq!(store.event_count("counter-c-1").await, 1);
    }

    #[tokio::test]
    async fn test_load_unknown_aggregate_returns_none() {
        let repo = repository(Arc::new(InMemoryEventStore::new()));

        assert!(repo.load_by_id(&"missing".to_string()).await.unwrap().is_none());
        assert!(!repo.exists(&"missing".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_written_at_interval() {
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotRepository::<CounterSnapshot>::new());
        let repo = repository(store.clone()).with_snapshots(snapshots.clone());

        let mut counter = Counter::create("c-1");
        counter.increment(1000);
        repo.save(&mut counter).await.unwrap();

        for _ in 0..97 {
            counter.increment(500);
            repo.save(&mut counter).await.unwrap();
        }
        assert_eq!(counter.version(), 99);
        assert_eq!(snapshots.count().await, 0);

        counter.increment(500);
        repo.save(&mut counter).await.unwrap();

        let snapshot = snapshots.get_latest("c-1").await.unwrap().unwrap();
        assert_eq!(snapshot.version, 100);
        assert_eq!(snapshot.value, 50_000);
    }

    #[tokio::test]
    async fn test_load_from_snapshot_replays_only_tail() {
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotRepository::<CounterSnapshot>::new());
        let repo = repository(store.clone())
            .with_snapshots(snapshots.clone())
            .with_snapshot_interval(3);

        let mut counter = Counter::create("c-1");
        counter.increment(1);
        counter.increment(2);
        repo.save(&mut counter).await.unwrap();
        counter.increment(4);
        repo.save(&mut counter).await.unwrap();

        // Tampering with the snapshot proves the load used it.
        let mut snapshot = snapshots.get_latest("c-1").await.unwrap().unwrap();
        assert_eq!(snapshot.version, 3);
        snapshot.value += 100;
        snapshots.save(&snapshot).await.unwrap();

        let loaded = repo.load_by_id(&"c-1".to_string()).await.unwrap().unwrap();
        assert_eq!(loaded.value, 107);
        assert_eq!(loaded.version(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_saves_one_conflicts() {
        let store = Arc::new(InMemoryEventStore::new());
        let repo = repository(store.clone());

        let mut counter = Counter::create("c-1");
        for _ in 0..4 {
            counter.increment(1);
        }
        repo.save(&mut counter).await.unwrap();

        let mut first = repo.load_by_id(&"c-1".to_string()).await.unwrap().unwrap();
        let mut second = repo.load_by_id(&"c-1".to_string()).await.unwrap().unwrap();
        first.increment(10);
        second.increment(20);

        let (a, b) = tokio::join!(repo.save(&mut first), repo.save(&mut second));
        let results = [a, b];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(e) if e.is_concurrency_conflict())));
        assert_eq!(store.event_count("counter-c-1").await, 6);
    }

    #[tokio::test]
    async fn test_projection_failure_reports_committed_version() {
        let store = Arc::new(InMemoryEventStore::new());
        let mut registry = ProjectionRegistry::new();
        registry.register(Arc::new(FailingProjection));
        let repo = repository(store.clone()).with_projections(Arc::new(registry));

        let mut counter = Counter::create("c-1");
        counter.increment(5);
        let err = repo.save(&mut counter).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Projection { committed_version: 2, .. }));
        assert_eq!(store.event_count("counter-c-1").await, 2);
        assert_eq!(counter.uncommitted_events().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_failures_never_block() {
        let store = Arc::new(InMemoryEventStore::new());
        let metrics = Arc::new(RepositoryMetrics::new().unwrap());
        let repo = repository(store.clone())
            .with_snapshots(Arc::new(BrokenSnapshots))
            .with_snapshot_interval(2)
            .with_metrics(metrics.clone());

        let mut counter = Counter::create("c-1");
        counter.increment(3);
        assert_eq!(repo.save(&mut counter).await.unwrap(), 2);

        let loaded = repo.load_by_id(&"c-1".to_string()).await.unwrap().unwrap();
        assert_eq!(loaded.value, 3);

        let failures = &metrics.snapshot_failures;
        assert_eq!(failures.with_label_values(&["counter", "save"]).get(), 1);
        assert_eq!(failures.with_label_values(&["counter", "load"]).get(), 1);
    }

    #[tokio::test]
    async fn test_metrics_count_appends_and_conflicts() {
        let store = Arc::new(InMemoryEventStore::new());
        let metrics = Arc::new(RepositoryMetrics::new().unwrap());
        let repo = repository(store).with_metrics(metrics.clone());

        let mut counter = Counter::create("c-1");
        counter.increment(1);
        repo.save(&mut counter).await.unwrap();

        let mut stale = Counter::create("c-1");
        assert!(repo.save(&mut stale).await.unwrap_err().is_concurrency_conflict());

        assert_eq!(metrics.events_appended.with_label_values(&["counter"]).get(), 2);
        assert_eq!(metrics.concurrency_conflicts.with_label_values(&["counter"]).get(), 1);
    }
}
