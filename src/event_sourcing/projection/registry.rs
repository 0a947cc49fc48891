use std::collections::HashMap;
use std::sync::Arc;

use super::projection::Projection;
use crate::event_sourcing::core::{EventEnvelope, ProjectionError};

// ============================================================================
// Projection Registry - routes committed events to read-model handlers
// ============================================================================
//
// One handler per event type. Events with no handler are skipped silently so
// retired event types can stay in the log without breaking live dispatch.
// Handler failures propagate unchanged.
//
// ============================================================================

#[derive(Default, Clone)]
pub struct ProjectionRegistry {
    projections: HashMap<String, Arc<dyn Projection>>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a projection to its event type, replacing any previous binding.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        let event_type = projection.event_type().to_string();
        if self.projections.insert(event_type.clone(), projection).is_some() {
            tracing::debug!(event_type = %event_type, "Replaced existing projection");
        }
    }

    pub async fn project(&self, event: &EventEnvelope) -> Result<(), ProjectionError> {
        let Some(projection) = self.projections.get(&event.event_type) else {
            tracing::trace!(event_type = %event.event_type, "No projection registered, skipping");
            return Ok(());
        };

        projection.project(event).await?;

        tracing::debug!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            "Projected event"
        );
        Ok(())
    }

    pub fn has_projection(&self, event_type: &str) -> bool {
        self.projections.contains_key(event_type)
    }

    pub fn registered_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.projections.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn unregister(&mut self, event_type: &str) {
        self.projections.remove(event_type);
    }

    pub fn clear(&mut self) {
        self.projections.clear();
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }
}
