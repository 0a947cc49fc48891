use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::aggregate::User;
use super::value_objects::{UserId, UserStatus};
use crate::event_sourcing::core::AggregateRoot;

// Same rules as the account views: rows carry the stream version and only a
// newer version replaces them.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id(),
            email: user.email().to_string(),
            name: user.name().to_string(),
            status: user.status(),
            created_at: user.created_at(),
            version: user.version(),
            updated_at: user.updated_at(),
        }
    }
}

#[async_trait]
pub trait UserReadModel: Send + Sync {
    async fn upsert(&self, view: &UserView) -> anyhow::Result<()>;

    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserView>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserView>>;

    async fn delete(&self, user_id: &UserId) -> anyhow::Result<()>;
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryUserReadModel {
    views: RwLock<HashMap<UserId, UserView>>,
}

impl InMemoryUserReadModel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserReadModel for InMemoryUserReadModel {
    async fn upsert(&self, view: &UserView) -> anyhow::Result<()> {
        let mut views = self.views.write().await;
        if let Some(existing) = views.get(&view.user_id) {
            if existing.version >= view.version {
                tracing::debug!(
                    user_id = %view.user_id,
                    stored_version = existing.version,
                    incoming_version = view.version,
                    "Ignoring user view that is not newer"
                );
                return Ok(());
            }
        }
        views.insert(view.user_id, view.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserView>> {
        Ok(self.views.read().await.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserView>> {
        Ok(self
            .views
            .read()
            .await
            .values()
            .find(|view| view.email == email)
            .cloned())
    }

    async fn delete(&self, user_id: &UserId) -> anyhow::Result<()> {
        self.views.write().await.remove(user_id);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Postgres
// ----------------------------------------------------------------------------

type UserRow = (Uuid, String, String, String, DateTime<Utc>, i64, DateTime<Utc>);

const SELECT_USER_VIEW: &str =
    "SELECT user_id, email, name, status, created_at, version, updated_at FROM user_views";

#[derive(Clone)]
pub struct PostgresUserReadModel {
    pool: PgPool,
}

impl PostgresUserReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_views (
                user_id    UUID PRIMARY KEY,
                email      TEXT NOT NULL,
                name       TEXT NOT NULL,
                status     TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                version    BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create user_views table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS user_views_email_idx ON user_views (email)")
            .execute(&self.pool)
            .await
            .context("Failed to create user_views email index")?;

        Ok(())
    }
}

fn view_from_row(row: UserRow) -> anyhow::Result<UserView> {
    let (user_id, email, name, status, created_at, version, updated_at) = row;

    Ok(UserView {
        user_id: UserId::from_uuid(user_id),
        email,
        name,
        status: status.parse()?,
        created_at,
        version: u64::try_from(version).context("Negative version in user_views")?,
        updated_at,
    })
}

#[async_trait]
impl UserReadModel for PostgresUserReadModel {
    async fn upsert(&self, view: &UserView) -> anyhow::Result<()> {
        let version = i64::try_from(view.version).context("Version exceeds BIGINT")?;

        sqlx::query(
            r#"
            INSERT INTO user_views (user_id, email, name, status, created_at, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                email      = EXCLUDED.email,
                name       = EXCLUDED.name,
                status     = EXCLUDED.status,
                version    = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE user_views.version < EXCLUDED.version
            "#,
        )
        .bind(view.user_id.as_uuid())
        .bind(&view.email)
        .bind(&view.name)
        .bind(view.status.as_str())
        .bind(view.created_at)
        .bind(version)
        .bind(view.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert user view {}", view.user_id))?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> anyhow::Result<Option<UserView>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE user_id = $1", SELECT_USER_VIEW))
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read user view {}", user_id))?;

        row.map(view_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserView>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE email = $1 ORDER BY created_at LIMIT 1",
            SELECT_USER_VIEW
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read user view by email")?;

        row.map(view_from_row).transpose()
    }

    async fn delete(&self, user_id: &UserId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM user_views WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete user view {}", user_id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(user_id: UserId, status: UserStatus, version: u64) -> UserView {
        UserView {
            user_id,
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            status,
            created_at: Utc::now(),
            version,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_only_moves_forward() {
        let read_model = InMemoryUserReadModel::new();
        let id = UserId::generate();
        let verified = view(id, UserStatus::Verified, 2);

        read_model.upsert(&verified).await.unwrap();
        read_model.upsert(&view(id, UserStatus::PendingVerification, 1)).await.unwrap();
        read_model.upsert(&view(id, UserStatus::PendingVerification, 2)).await.unwrap();

        assert_eq!(read_model.find_by_id(&id).await.unwrap().unwrap(), verified);
    }

    #[tokio::test]
    async fn test_find_by_email_and_delete() {
        let read_model = InMemoryUserReadModel::new();
        let id = UserId::generate();
        read_model.upsert(&view(id, UserStatus::PendingVerification, 1)).await.unwrap();

        let found = read_model.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.user_id, id);
        assert!(read_model.find_by_email("bob@example.com").await.unwrap().is_none());

        read_model.delete(&id).await.unwrap();
        assert!(read_model.find_by_id(&id).await.unwrap().is_none());
    }

    #[test]
    fn test_view_from_row() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let row = |status: &str, version: i64| -> UserRow {
            (id, "ada@example.com".into(), "Ada".into(), status.into(), now, version, now)
        };

        let view = view_from_row(row("VERIFIED", 2)).unwrap();
        assert_eq!(view.user_id.as_uuid(), id);
        assert_eq!(view.status, UserStatus::Verified);
        assert_eq!(view.version, 2);

        assert!(view_from_row(row("BANNED", 1)).is_err());
        assert!(view_from_row(row("VERIFIED", -1)).is_err());
    }
}
