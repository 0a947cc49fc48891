use super::value_objects::{AccountId, AccountStatus};

// ============================================================================
// Account Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Account is not active (status: {0})")]
    NotActive(AccountStatus),

    #[error("Account {0} is already open")]
    AlreadyOpen(AccountId),

    #[error("Account is closed")]
    AlreadyClosed,

    #[error("Cannot close account with non-zero balance: {0}")]
    NonZeroBalance(u64),

    #[error("Unknown account status: {0}")]
    UnknownStatus(String),

    #[error("Failed to record event: {0}")]
    Serialization(#[from] serde_json::Error),
}
