use super::aggregate::User;
use super::errors::UserError;
use super::value_objects::UserId;

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Register {
        user_id: UserId,
        email: String,
        name: String,
    },
    Verify,
}

impl UserCommand {
    /// Apply a command against an already-registered user.
    pub fn execute(&self, user: &mut User) -> Result<(), UserError> {
        match self {
            UserCommand::Register { .. } => Err(UserError::AlreadyRegistered(user.id())),
            UserCommand::Verify => user.verify(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::Register { .. } => "Register",
            UserCommand::Verify => "Verify",
        }
    }
}
