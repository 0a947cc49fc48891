use async_trait::async_trait;

use crate::event_sourcing::core::{EventEnvelope, ProjectionError};

/// Read-model updater bound to one event type.
///
/// Implementations must be idempotent: projecting the same envelope twice
/// leaves the read model exactly as projecting it once.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Event type this projection handles.
    fn event_type(&self) -> &str;

    async fn project(&self, event: &EventEnvelope) -> Result<(), ProjectionError>;
}
