// ============================================================================
// Projections - keep read models in step with committed events
// ============================================================================

pub mod aggregate_projection;
pub mod projection;
pub mod registry;

pub use aggregate_projection::{AggregateProjection, ReadModelWriter};
pub use projection::Projection;
pub use registry::ProjectionRegistry;
