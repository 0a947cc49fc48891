use async_trait::async_trait;
use std::sync::Arc;

use super::aggregate::Account;
use super::events::event_types;
use super::read_model::{AccountReadModel, AccountView};
use super::rehydrator::AccountRehydrator;
use crate::event_sourcing::projection::{AggregateProjection, ProjectionRegistry, ReadModelWriter};
use crate::event_sourcing::repository::EventSourcedRepository;

/// Upserts the replayed account into the read model.
pub struct AccountViewWriter {
    read_model: Arc<dyn AccountReadModel>,
}

impl AccountViewWriter {
    pub fn new(read_model: Arc<dyn AccountReadModel>) -> Self {
        Self { read_model }
    }
}

#[async_trait]
impl ReadModelWriter<Account> for AccountViewWriter {
    async fn write(&self, account: &Account) -> anyhow::Result<()> {
        self.read_model.upsert(&AccountView::from_account(account)).await
    }
}

/// One reload-and-upsert projection per account event type.
pub fn account_projection_registry(
    loader: EventSourcedRepository<AccountRehydrator>,
    read_model: Arc<dyn AccountReadModel>,
) -> ProjectionRegistry {
    let loader = loader.without_projections();
    let writer: Arc<dyn ReadModelWriter<Account>> = Arc::new(AccountViewWriter::new(read_model));

    let mut registry = ProjectionRegistry::new();
    for event_type in event_types::ALL {
        registry.register(Arc::new(AggregateProjection::<AccountRehydrator>::new(
            event_type,
            loader.clone(),
            writer.clone(),
        )));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::read_model::InMemoryAccountReadModel;
    use crate::domain::account::value_objects::AccountStatus;
    use crate::event_sourcing::core::{AggregateRoot, EventEnvelope};
    use crate::event_sourcing::store::{EventStore, InMemoryEventStore};

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        read_model: Arc<InMemoryAccountReadModel>,
        repository: EventSourcedRepository<AccountRehydrator>,
        registry: Arc<ProjectionRegistry>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryEventStore::new());
        let read_model = Arc::new(InMemoryAccountReadModel::new());
        let base = EventSourcedRepository::<AccountRehydrator>::new(store.clone());
        let registry = Arc::new(account_projection_registry(base.clone(), read_model.clone()));
        let repository = base.with_projections(registry.clone());

        Fixture { store, read_model, repository, registry }
    }

    #[test]
    fn test_every_account_event_has_a_projection() {
        let fixture = fixture();
        for event_type in event_types::ALL {
            assert!(fixture.registry.has_projection(event_type));
        }
        assert_eq!(fixture.registry.len(), event_types::ALL.len());
    }

    #[tokio::test]
    async fn test_save_updates_read_model() {
        let fixture = fixture();

        let mut account = Account::open(0).unwrap();
        account.deposit(1_000).unwrap();
        fixture.repository.save(&mut account).await.unwrap();

        let view = fixture.read_model.find_by_id(&account.id()).await.unwrap().unwrap();
        assert_eq!(view.balance, 1_000);
        assert_eq!(view.status, AccountStatus::Active);
        assert_eq!(view.version, 2);
        assert_eq!(fixture.store.event_count(&account.stream_name()).await, 2);
    }

    #[tokio::test]
    async fn test_reprojecting_an_event_is_idempotent() {
        let fixture = fixture();

        let mut account = Account::open(0).unwrap();
        account.deposit(700).unwrap();
        fixture.repository.save(&mut account).await.unwrap();

        let events = fixture.store.read_events(&account.stream_name()).await.unwrap();
        let before = fixture.read_model.find_by_id(&account.id()).await.unwrap().unwrap();

        fixture.registry.project(&events[1]).await.unwrap();
        let after = fixture.read_model.find_by_id(&account.id()).await.unwrap().unwrap();

        assert_eq!(before, after);

        // A fresh read model fed the same event twice ends up with one row
        let replica = Arc::new(InMemoryAccountReadModel::new());
        let replica_registry = account_projection_registry(
            EventSourcedRepository::new(fixture.store.clone()),
            replica.clone(),
        );
        replica_registry.project(&events[1]).await.unwrap();
        let once = replica.find_by_id(&account.id()).await.unwrap().unwrap();
        replica_registry.project(&events[1]).await.unwrap();
        let twice = replica.find_by_id(&account.id()).await.unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, before);
    }

    #[tokio::test]
    async fn test_unregistered_event_type_leaves_read_model_unchanged() {
        let fixture = fixture();

        let mut account = Account::open(300).unwrap();
        fixture.repository.save(&mut account).await.unwrap();
        let before = fixture.read_model.find_by_id(&account.id()).await.unwrap();

        let retired = EventEnvelope::new(
            "account",
            account.id().to_string(),
            "AccountRenamed",
            serde_json::json!({"name": "savings"}),
        );
        fixture.registry.project(&retired).await.unwrap();

        assert_eq!(fixture.read_model.find_by_id(&account.id()).await.unwrap(), before);
    }
}
