use async_trait::async_trait;
use std::sync::Arc;

use super::aggregate::User;
use super::events::event_types;
use super::read_model::{UserReadModel, UserView};
use super::rehydrator::UserRehydrator;
use crate::event_sourcing::projection::{AggregateProjection, ProjectionRegistry, ReadModelWriter};
use crate::event_sourcing::repository::EventSourcedRepository;

pub struct UserViewWriter {
    read_model: Arc<dyn UserReadModel>,
}

impl UserViewWriter {
    pub fn new(read_model: Arc<dyn UserReadModel>) -> Self {
        Self { read_model }
    }
}

#[async_trait]
impl ReadModelWriter<User> for UserViewWriter {
    async fn write(&self, user: &User) -> anyhow::Result<()> {
        self.read_model.upsert(&UserView::from_user(user)).await
    }
}

/// One reload-and-upsert projection per user event type.
pub fn user_projection_registry(
    loader: EventSourcedRepository<UserRehydrator>,
    read_model: Arc<dyn UserReadModel>,
) -> ProjectionRegistry {
    let loader = loader.without_projections();
    let writer: Arc<dyn ReadModelWriter<User>> = Arc::new(UserViewWriter::new(read_model));

    let mut registry = ProjectionRegistry::new();
    for event_type in event_types::ALL {
        registry.register(Arc::new(AggregateProjection::<UserRehydrator>::new(
            event_type,
            loader.clone(),
            writer.clone(),
        )));
    }
    registry
}
