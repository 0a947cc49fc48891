// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/
//
// ============================================================================

// Core abstractions (GENERIC - works with any aggregate)
pub mod core;
pub mod projection;
pub mod repository;
pub mod snapshot;
pub mod store;

// Re-export core infrastructure
pub use self::core::*;
pub use projection::{AggregateProjection, Projection, ProjectionRegistry, ReadModelWriter};
pub use repository::{EventSourcedRepository, DEFAULT_SNAPSHOT_INTERVAL};
pub use snapshot::{InMemorySnapshotRepository, SnapshotRepository};
pub use store::{EventStore, InMemoryEventStore};
