use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{Email, UserId, UserName, UserStatus};
use crate::event_sourcing::core::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub email: Email,
    pub name: UserName,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub snapshot_at: DateTime<Utc>,
}

impl Snapshot for UserSnapshot {
    fn aggregate_id(&self) -> String {
        self.user_id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }
}
