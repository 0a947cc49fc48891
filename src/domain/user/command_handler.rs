use super::aggregate::User;
use super::commands::UserCommand;
use super::errors::UserError;
use super::rehydrator::UserRehydrator;
use super::value_objects::UserId;
use crate::event_sourcing::core::{AggregateRoot, RepositoryError};
use crate::event_sourcing::repository::EventSourcedRepository;
use crate::utils::retry::{retry_on_transient, IsTransient, RetryConfig};

// Command → load User → execute → save, with the same conflict retry as
// accounts.

#[derive(Debug, thiserror::Error)]
pub enum UserCommandError {
    #[error(transparent)]
    Domain(#[from] UserError),

    #[error("User not found: {0}")]
    NotFound(UserId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IsTransient for UserCommandError {
    fn is_transient(&self) -> bool {
        matches!(self, UserCommandError::Repository(e) if e.is_transient())
    }
}

pub struct UserCommandHandler {
    repository: EventSourcedRepository<UserRehydrator>,
    retry: RetryConfig,
}

impl UserCommandHandler {
    pub fn new(repository: EventSourcedRepository<UserRehydrator>) -> Self {
        Self {
            repository,
            retry: RetryConfig::for_conflicts(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn register(&self, email: &str, name: &str) -> Result<User, UserCommandError> {
        self.register_with_id(UserId::generate(), email, name).await
    }

    pub async fn handle(&self, user_id: UserId, command: UserCommand) -> Result<User, UserCommandError> {
        if let UserCommand::Register { user_id, email, name } = &command {
            return self.register_with_id(*user_id, email, name).await;
        }

        let this = self;
        let user = retry_on_transient(self.retry.clone(), move |attempt| {
            let command = command.clone();
            async move { this.execute_once(user_id, &command, attempt).await }
        })
        .await
        .into_result()?;

        tracing::info!(user_id = %user_id, version = user.version(), "Command handled");
        Ok(user)
    }

    async fn register_with_id(&self, user_id: UserId, email: &str, name: &str) -> Result<User, UserCommandError> {
        let mut user = User::register_with_id(user_id, email, name)?;

        match self.repository.save(&mut user).await {
            Ok(_) => {
                tracing::info!(user_id = %user_id, email = %user.email(), "User registered");
                Ok(user)
            }
            Err(e) if e.is_concurrency_conflict() => Err(UserError::AlreadyRegistered(user_id).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute_once(
        &self,
        user_id: UserId,
        command: &UserCommand,
        attempt: u32,
    ) -> Result<User, UserCommandError> {
        let mut user = self
            .repository
            .load_by_id(&user_id)
            .await?
            .ok_or(UserCommandError::NotFound(user_id))?;

        command.execute(&mut user)?;
        self.repository.save(&mut user).await?;

        tracing::debug!(user_id = %user_id, command = command.name(), attempt, "Command executed");
        Ok(user)
    }
}
