// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// This module contains GENERIC, reusable event sourcing infrastructure
// that works with ANY domain aggregate.
//
// Key Principles:
// - No domain-specific code (no Account, Order, ...)
// - Generic over aggregate, identity and snapshot types
// - Reusable across all aggregates
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;
pub mod rehydrator;

// Re-export core types for convenience
pub use aggregate::{AggregateRoot, PendingEvents};
pub use error::{EventStoreError, ProjectionError, RehydrateError, RepositoryError, SnapshotError};
pub use event::{stream_name, DomainEvent, EventEnvelope};
pub use rehydrator::{Rehydrator, Snapshot};
