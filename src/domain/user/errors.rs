use super::value_objects::{UserId, UserStatus};

// ============================================================================
// User Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("User name cannot be empty")]
    EmptyName,

    #[error("User name is too long ({0} characters)")]
    NameTooLong(usize),

    #[error("User is not pending verification (status: {0})")]
    NotPendingVerification(UserStatus),

    #[error("User {0} is already registered")]
    AlreadyRegistered(UserId),

    #[error("Unknown user status: {0}")]
    UnknownStatus(String),

    #[error("Failed to record event: {0}")]
    Serialization(#[from] serde_json::Error),
}
