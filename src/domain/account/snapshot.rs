use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{AccountId, AccountStatus};
use crate::event_sourcing::core::Snapshot;

/// Checkpoint of an account at a known stream version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub balance: u64,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub snapshot_at: DateTime<Utc>,
}

impl Snapshot for AccountSnapshot {
    fn aggregate_id(&self) -> String {
        self.account_id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }
}
