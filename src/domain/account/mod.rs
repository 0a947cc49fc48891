// ============================================================================
// Account Domain - Business Logic for Account Aggregate
// ============================================================================
//
// This module contains ALL Account-specific code:
// - Value objects (AccountId, Balance, AccountStatus)
// - Events (AccountCreated, MoneyDeposited, ...)
// - Commands and the retrying command handler
// - Rehydrator and snapshot for the generic repository
// - Read model, projections and queries
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod projections;
pub mod queries;
pub mod read_model;
pub mod rehydrator;
pub mod snapshot;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::Account;
pub use command_handler::{AccountCommandHandler, CommandError};
pub use commands::AccountCommand;
pub use errors::AccountError;
pub use events::*;
pub use projections::{account_projection_registry, AccountViewWriter};
pub use queries::AccountQueryService;
pub use read_model::{AccountReadModel, AccountView, InMemoryAccountReadModel, PostgresAccountReadModel};
pub use rehydrator::AccountRehydrator;
pub use snapshot::AccountSnapshot;
pub use value_objects::{AccountId, AccountStatus, Balance};
