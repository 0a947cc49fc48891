// ============================================================================
// Snapshots - checkpoint persistence
// ============================================================================
//
// Pure performance optimisation: every backend may lose data without
// affecting correctness, only load latency.
//
// ============================================================================

pub mod memory;
pub mod redis_snapshot;
pub mod scylla_snapshot;
pub mod snapshot_repository;

pub use memory::InMemorySnapshotRepository;
pub use redis_snapshot::RedisSnapshotRepository;
pub use scylla_snapshot::ScyllaSnapshotRepository;
pub use snapshot_repository::SnapshotRepository;
