use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{Email, UserId, UserName, UserStatus};
use crate::event_sourcing::core::DomainEvent;

pub mod event_types {
    pub const USER_CREATED: &str = "UserCreated";
    pub const USER_VERIFIED: &str = "UserVerified";

    pub const ALL: [&str; 2] = [USER_CREATED, USER_VERIFIED];
}

/// User Created - registration, always the first event of a user stream
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserCreated {
    pub user_id: UserId,
    pub email: Email,
    pub name: UserName,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl DomainEvent for UserCreated {
    fn event_type(&self) -> &'static str { event_types::USER_CREATED }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserVerified {
    pub user_id: UserId,
    pub verified_at: DateTime<Utc>,
}

impl DomainEvent for UserVerified {
    fn event_type(&self) -> &'static str { event_types::USER_VERIFIED }
}
