use super::aggregate::Account;
use super::commands::AccountCommand;
use super::errors::AccountError;
use super::rehydrator::AccountRehydrator;
use super::value_objects::AccountId;
use crate::event_sourcing::core::{AggregateRoot, RepositoryError};
use crate::event_sourcing::repository::EventSourcedRepository;
use crate::utils::retry::{retry_on_transient, IsTransient, RetryConfig};

// ============================================================================
// Account Command Handler
// ============================================================================
//
// Orchestrates: Command → load Account → execute → save
//
// A lost append race is retried from a fresh load with backoff. Business
// rule violations and projection failures are returned as-is.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] AccountError),

    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IsTransient for CommandError {
    fn is_transient(&self) -> bool {
        matches!(self, CommandError::Repository(e) if e.is_transient())
    }
}

pub struct AccountCommandHandler {
    repository: EventSourcedRepository<AccountRehydrator>,
    retry: RetryConfig,
}

impl AccountCommandHandler {
    pub fn new(repository: EventSourcedRepository<AccountRehydrator>) -> Self {
        Self {
            repository,
            retry: RetryConfig::for_conflicts(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Open a new account and persist its creation event.
    pub async fn open_account(&self, initial_balance: u64) -> Result<Account, CommandError> {
        self.open(AccountId::generate(), initial_balance).await
    }

    /// Handle a command and return the account as committed.
    ///
    /// For `OpenAccount` the id inside the command wins over `account_id`.
    pub async fn handle(
        &self,
        account_id: AccountId,
        command: AccountCommand,
    ) -> Result<Account, CommandError> {
        if let AccountCommand::OpenAccount { account_id, initial_balance } = command {
            return self.open(account_id, initial_balance).await;
        }

        let this = self;
        let account = retry_on_transient(self.retry.clone(), move |attempt| {
            let command = command.clone();
            async move { this.execute_once(account_id, &command, attempt).await }
        })
        .await
        .into_result()?;

        tracing::info!(
            account_id = %account_id,
            version = account.version(),
            "Command handled"
        );
        Ok(account)
    }

    async fn open(&self, account_id: AccountId, initial_balance: u64) -> Result<Account, CommandError> {
        let mut account = Account::open_with_id(account_id, initial_balance)?;

        match self.repository.save(&mut account).await {
            Ok(_) => {
                tracing::info!(account_id = %account_id, initial_balance, "Account opened");
                Ok(account)
            }
            Err(e) if e.is_concurrency_conflict() => Err(AccountError::AlreadyOpen(account_id).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute_once(
        &self,
        account_id: AccountId,
        command: &AccountCommand,
        attempt: u32,
    ) -> Result<Account, CommandError> {
        let mut account = self
            .repository
            .load_by_id(&account_id)
            .await?
            .ok_or(CommandError::NotFound(account_id))?;

        command.execute(&mut account)?;
        self.repository.save(&mut account).await?;

        tracing::debug!(
            account_id = %account_id,
            command = command.name(),
            attempt,
            "Command executed"
        );
        Ok(account)
    }
}
