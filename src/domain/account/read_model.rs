use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::aggregate::Account;
use super::value_objects::{AccountId, AccountStatus};
use crate::event_sourcing::core::AggregateRoot;

// ============================================================================
// Account Read Model
// ============================================================================
//
// Written only by projections. Rows carry the stream version they reflect
// and every field is derived from replayed state. An upsert only lands when
// it moves a row to a newer version, so replays and duplicate deliveries
// leave the row as the first delivery wrote it.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub account_id: AccountId,
    pub balance: u64,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl AccountView {
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id(),
            balance: account.balance().value(),
            status: account.status(),
            created_at: account.created_at(),
            version: account.version(),
            updated_at: account.updated_at(),
        }
    }
}

#[async_trait]
pub trait AccountReadModel: Send + Sync {
    async fn upsert(&self, view: &AccountView) -> anyhow::Result<()>;

    async fn find_by_id(&self, account_id: &AccountId) -> anyhow::Result<Option<AccountView>>;

    async fn delete(&self, account_id: &AccountId) -> anyhow::Result<()>;
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAccountReadModel {
    views: RwLock<HashMap<AccountId, AccountView>>,
}

impl InMemoryAccountReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.views.read().await.len()
    }
}

#[async_trait]
impl AccountReadModel for InMemoryAccountReadModel {
    async fn upsert(&self, view: &AccountView) -> anyhow::Result<()> {
        let mut views = self.views.write().await;
        match views.get(&view.account_id) {
            Some(existing) if existing.version >= view.version => {
                tracing::debug!(
                    account_id = %view.account_id,
                    stored_version = existing.version,
                    incoming_version = view.version,
                    "Ignoring account view that is not newer"
                );
            }
            _ => {
                views.insert(view.account_id, view.clone());
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, account_id: &AccountId) -> anyhow::Result<Option<AccountView>> {
        Ok(self.views.read().await.get(account_id).cloned())
    }

    async fn delete(&self, account_id: &AccountId) -> anyhow::Result<()> {
        self.views.write().await.remove(account_id);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Postgres
// ----------------------------------------------------------------------------

type ViewRow = (Uuid, i64, String, DateTime<Utc>, i64, DateTime<Utc>);

#[derive(Clone)]
pub struct PostgresAccountReadModel {
    pool: PgPool,
}

impl PostgresAccountReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS account_views (
                account_id UUID PRIMARY KEY,
                balance    BIGINT NOT NULL,
                status     TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                version    BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create account_views table")?;

        Ok(())
    }
}

fn view_from_row(row: ViewRow) -> anyhow::Result<AccountView> {
    let (account_id, balance, status, created_at, version, updated_at) = row;

    Ok(AccountView {
        account_id: AccountId::from_uuid(account_id),
        balance: u64::try_from(balance).context("Negative balance in account_views")?,
        status: status.parse()?,
        created_at,
        version: u64::try_from(version).context("Negative version in account_views")?,
        updated_at,
    })
}

#[async_trait]
impl AccountReadModel for PostgresAccountReadModel {
    async fn upsert(&self, view: &AccountView) -> anyhow::Result<()> {
        let balance = i64::try_from(view.balance).context("Balance exceeds BIGINT")?;
        let version = i64::try_from(view.version).context("Version exceeds BIGINT")?;

        sqlx::query(
            r#"
            INSERT INTO account_views (account_id, balance, status, created_at, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id) DO UPDATE SET
                balance    = EXCLUDED.balance,
                status     = EXCLUDED.status,
                version    = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE account_views.version < EXCLUDED.version
            "#,
        )
        .bind(view.account_id.as_uuid())
        .bind(balance)
        .bind(view.status.as_str())
        .bind(view.created_at)
        .bind(version)
        .bind(view.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert account view {}", view.account_id))?;

        Ok(())
    }

    async fn find_by_id(&self, account_id: &AccountId) -> anyhow::Result<Option<AccountView>> {
        let row = sqlx::query_as::<_, ViewRow>(
            r#"
            SELECT account_id, balance, status, created_at, version, updated_at
            FROM account_views
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read account view {}", account_id))?;

        row.map(view_from_row).transpose()
    }

    async fn delete(&self, account_id: &AccountId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM account_views WHERE account_id = $1")
            .bind(account_id.as_uuid())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete account view {}", account_id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(account_id: AccountId, balance: u64, version: u64) -> AccountView {
        AccountView {
            account_id,
            balance,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            version,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let read_model = InMemoryAccountReadModel::new();
        let id = AccountId::generate();

        read_model.upsert(&view(id, 100, 1)).await.unwrap();
        read_model.upsert(&view(id, 250, 2)).await.unwrap();

        let found = read_model.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.balance, 250);
        assert_eq!(read_model.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_upsert_is_ignored() {
        let read_model = InMemoryAccountReadModel::new();
        let id = AccountId::generate();

        read_model.upsert(&view(id, 250, 2)).await.unwrap();
        read_model.upsert(&view(id, 100, 1)).await.unwrap();

        assert_eq!(read_model.find_by_id(&id).await.unwrap().unwrap().balance, 250);
    }

    #[tokio::test]
    async fn test_equal_version_upsert_is_a_no_op() {
        let read_model = InMemoryAccountReadModel::new();
        let id = AccountId::generate();
        let first = view(id, 250, 2);

        read_model.upsert(&first).await.unwrap();
        read_model.upsert(&view(id, 999, 2)).await.unwrap();

        assert_eq!(read_model.find_by_id(&id).await.unwrap().unwrap(), first);
    }

    #[test]
    fn test_view_from_account_is_deterministic() {
        let mut account = Account::open(100).unwrap();
        account.deposit(50).unwrap();

        let view = AccountView::from_account(&account);
        assert_eq!(view.updated_at, account.updated_at());
        assert_eq!(AccountView::from_account(&account), view);
    }

    #[tokio::test]
    async fn test_delete() {
        let read_model = InMemoryAccountReadModel::new();
        let id = AccountId::generate();

        read_model.upsert(&view(id, 1, 1)).await.unwrap();
        read_model.delete(&id).await.unwrap();

        assert!(read_model.find_by_id(&id).await.unwrap().is_none());
    }

    #[test]
    fn test_view_from_row() {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let view = view_from_row((id, 5_000, "SUSPENDED".to_string(), now, 7, now)).unwrap();
        assert_eq!(view.account_id.as_uuid(), id);
        assert_eq!(view.balance, 5_000);
        assert_eq!(view.status, AccountStatus::Suspended);
        assert_eq!(view.version, 7);

        assert!(view_from_row((id, -1, "ACTIVE".to_string(), now, 1, now)).is_err());
        assert!(view_from_row((id, 1, "FROZEN".to_string(), now, 1, now)).is_err());
    }
}
