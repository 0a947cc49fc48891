use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{AccountId, AccountStatus};
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Account Events - Domain Events for Account Aggregate
// ============================================================================
//
// Payloads carry deltas (amounts), never the resulting balance. Replay
// recomputes state from them.
//
// ============================================================================

pub mod event_types {
    pub const ACCOUNT_CREATED: &str = "AccountCreated";
    pub const MONEY_DEPOSITED: &str = "MoneyDeposited";
    pub const MONEY_WITHDRAWN: &str = "MoneyWithdrawn";
    pub const ACCOUNT_SUSPENDED: &str = "AccountSuspended";
    pub const ACCOUNT_ACTIVATED: &str = "AccountActivated";
    pub const ACCOUNT_CLOSED: &str = "AccountClosed";

    pub const ALL: [&str; 6] = [
        ACCOUNT_CREATED,
        MONEY_DEPOSITED,
        MONEY_WITHDRAWN,
        ACCOUNT_SUSPENDED,
        ACCOUNT_ACTIVATED,
        ACCOUNT_CLOSED,
    ];
}

/// Account Created - Initial event in account lifecycle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountCreated {
    pub account_id: AccountId,
    pub initial_balance: u64,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl DomainEvent for AccountCreated {
    fn event_type(&self) -> &'static str { event_types::ACCOUNT_CREATED }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MoneyDeposited {
    pub account_id: AccountId,
    pub amount: u64,
    pub deposited_at: DateTime<Utc>,
}

impl DomainEvent for MoneyDeposited {
    fn event_type(&self) -> &'static str { event_types::MONEY_DEPOSITED }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MoneyWithdrawn {
    pub account_id: AccountId,
    pub amount: u64,
    pub withdrawn_at: DateTime<Utc>,
}

impl DomainEvent for MoneyWithdrawn {
    fn event_type(&self) -> &'static str { event_types::MONEY_WITHDRAWN }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountSuspended {
    pub account_id: AccountId,
    pub suspended_at: DateTime<Utc>,
}

impl DomainEvent for AccountSuspended {
    fn event_type(&self) -> &'static str { event_types::ACCOUNT_SUSPENDED }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountActivated {
    pub account_id: AccountId,
    pub activated_at: DateTime<Utc>,
}

impl DomainEvent for AccountActivated {
    fn event_type(&self) -> &'static str { event_types::ACCOUNT_ACTIVATED }
}

/// Account Closed - terminal state
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountClosed {
    pub account_id: AccountId,
    pub closed_at: DateTime<Utc>,
}

impl DomainEvent for AccountClosed {
    fn event_type(&self) -> &'static str { event_types::ACCOUNT_CLOSED }
}
