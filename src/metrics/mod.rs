// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for the persistence engine:
// - Events appended per aggregate type
// - Optimistic concurrency conflicts
// - Projection failures (read model falling behind)
// - Snapshot writes and swallowed snapshot failures
// - Aggregate load latency, split by snapshot vs full replay
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Load path label values
pub const LOAD_PATH_SNAPSHOT: &str = "snapshot";
pub const LOAD_PATH_FULL_REPLAY: &str = "full_replay";

pub struct RepositoryMetrics {
    registry: Registry,

    // Write side
    pub events_appended: IntCounterVec,
    pub concurrency_conflicts: IntCounterVec,

    // Read model
    pub projection_failures: IntCounterVec,

    // Snapshots
    pub snapshots_written: IntCounterVec,
    pub snapshot_failures: IntCounterVec,

    // Read side of the write model
    pub aggregate_load_duration: HistogramVec,
}

impl RepositoryMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events committed to the event store"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new("concurrency_conflicts_total", "Appends rejected by optimistic concurrency"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let projection_failures = IntCounterVec::new(
            Opts::new("projection_failures_total", "Committed events whose projection failed"),
            &["event_type"],
        )?;
        registry.register(Box::new(projection_failures.clone()))?;

        let snapshots_written = IntCounterVec::new(
            Opts::new("snapshots_written_total", "Snapshots persisted"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(snapshots_written.clone()))?;

        let snapshot_failures = IntCounterVec::new(
            Opts::new("snapshot_failures_total", "Snapshot reads or writes that failed and were skipped"),
            &["aggregate_type", "operation"],
        )?;
        registry.register(Box::new(snapshot_failures.clone()))?;

        let aggregate_load_duration = HistogramVec::new(
            HistogramOpts::new("aggregate_load_duration_seconds", "Time to rebuild an aggregate")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["aggregate_type", "path"],
        )?;
        registry.register(Box::new(aggregate_load_duration.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            concurrency_conflicts,
            projection_failures,
            snapshots_written,
            snapshot_failures,
            aggregate_load_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_append(&self, aggregate_type: &str, event_count: usize) {
        self.events_appended
            .with_label_values(&[aggregate_type])
            .inc_by(event_count as u64);
    }

    pub fn record_conflict(&self, aggregate_type: &str) {
        self.concurrency_conflicts.with_label_values(&[aggregate_type]).inc();
    }

    pub fn record_projection_failure(&self, event_type: &str) {
        self.projection_failures.with_label_values(&[event_type]).inc();
    }

    pub fn record_snapshot_written(&self, aggregate_type: &str) {
        self.snapshots_written.with_label_values(&[aggregate_type]).inc();
    }

    pub fn record_snapshot_failure(&self, aggregate_type: &str, operation: &str) {
        self.snapshot_failures
            .with_label_values(&[aggregate_type, operation])
            .inc();
    }

    pub fn record_load(&self, aggregate_type: &str, path: &str, duration_secs: f64) {
        self.aggregate_load_duration
            .with_label_values(&[aggregate_type, path])
            .observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RepositoryMetrics::new().unwrap();
        metrics.record_append("account", 1);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_append_counts_events() {
        let metrics = RepositoryMetrics::new().unwrap();
        metrics.record_append("account", 2);
        metrics.record_append("account", 3);

        assert_eq!(metrics.events_appended.with_label_values(&["account"]).get(), 5);
    }

    #[test]
    fn test_conflicts_and_failures_are_labelled() {
        let metrics = RepositoryMetrics::new().unwrap();
        metrics.record_conflict("account");
        metrics.record_projection_failure("MoneyDeposited");
        metrics.record_snapshot_failure("account", "save");

        assert_eq!(metrics.concurrency_conflicts.with_label_values(&["account"]).get(), 1);
        assert_eq!(metrics.projection_failures.with_label_values(&["MoneyDeposited"]).get(), 1);
        assert_eq!(metrics.snapshot_failures.with_label_values(&["account", "save"]).get(), 1);
        assert_eq!(metrics.snapshot_failures.with_label_values(&["account", "load"]).get(), 0);
    }

    #[test]
    fn test_load_histogram_by_path() {
        let metrics = RepositoryMetrics::new().unwrap();
        metrics.record_load("account", LOAD_PATH_SNAPSHOT, 0.002);
        metrics.record_load("account", LOAD_PATH_FULL_REPLAY, 0.02);
        metrics.record_load("account", LOAD_PATH_FULL_REPLAY, 0.03);

        let replay = metrics
            .aggregate_load_duration
            .with_label_values(&["account", LOAD_PATH_FULL_REPLAY]);
        assert_eq!(replay.get_sample_count(), 2);
    }
}
