// ============================================================================
// User Domain - registration and email verification
// ============================================================================
//
// Same layout as `account`, persisted through the same generic repository:
// - Value objects (UserId, Email, UserName, UserStatus)
// - Events (UserCreated, UserVerified)
// - Commands and the retrying command handler
// - Rehydrator and snapshot
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

pub use aggregate::User;
pub use command_handler::{UserCommandError, UserCommandHandler};
pub use commands::UserCommand;
pub use errors::UserError;
pub use events::*;
pub use projections::{user_projection_registry, UserViewWriter};
pub use queries::UserQueryService;
pub use read_model::{InMemoryUserReadModel, PostgresUserReadModel, UserReadModel, UserView};
pub use rehydrator::UserRehydrator;
pub use snapshot::UserSnapshot;
pub use value_objects::{Email, UserId, UserName, UserStatus};
