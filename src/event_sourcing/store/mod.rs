// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// The EventStore port plus its backends. All of them work with ANY
// aggregate: payloads are opaque JSON to the log.
//
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod scylla_store;

pub use event_store::EventStore;
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use scylla_store::ScyllaEventStore;
