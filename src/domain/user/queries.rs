use std::sync::Arc;

use super::read_model::{UserReadModel, UserView};
use super::value_objects::UserId;

pub struct UserQueryService {
    read_model: Arc<dyn UserReadModel>,
}

impl UserQueryService {
    pub fn new(read_model: Arc<dyn UserReadModel>) -> Self {
        Self { read_model }
    }

    pub async fn get_user(&self, user_id: &UserId) -> anyhow::Result<Option<UserView>> {
        let view = self.read_model.find_by_id(user_id).await?;
        tracing::debug!(user_id = %user_id, found = view.is_some(), "User query");
        Ok(view)
    }

    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserView>> {
        self.read_model.find_by_email(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::read_model::InMemoryUserReadModel;
    use crate::domain::user::value_objects::UserStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn test_get_user_and_lookup_by_email() {
        let read_model = Arc::new(InMemoryUserReadModel::new());
        let queries = UserQueryService::new(read_model.clone());
        let id = UserId::generate();

        assert!(queries.get_user(&id).await.unwrap().is_none());

        read_model
            .upsert(&UserView {
                user_id: id,
                email: "grace@example.com".to_string(),
                name: "Grace".to_string(),
                status: UserStatus::Verified,
                created_at: Utc::now(),
                version: 2,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(queries.get_user(&id).await.unwrap().unwrap().name, "Grace");
        assert_eq!(queries.find_by_email("grace@example.com").await.unwrap().unwrap().user_id, id);
    }
}
