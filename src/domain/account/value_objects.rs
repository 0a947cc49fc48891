use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::AccountError;

// ============================================================================
// Account Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Non-negative amount in integer minor units (cents), capped at `i64::MAX`
/// so it fits a signed 64-bit column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    pub const MAX: u64 = i64::MAX as u64;

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn credit(self, amount: u64) -> Result<Self, AccountError> {
        self.0
            .checked_add(amount)
            .filter(|total| *total <= Self::MAX)
            .map(Self)
            .ok_or(AccountError::BalanceOverflow)
    }

    pub fn debit(self, amount: u64) -> Result<Self, AccountError> {
        self.0
            .checked_sub(amount)
            .map(Self)
            .ok_or(AccountError::InsufficientFunds {
                balance: self.0,
                requested: amount,
            })
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Closed => "CLOSED",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, AccountStatus::Closed)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "SUSPENDED" => Ok(AccountStatus::Suspended),
            "CLOSED" => Ok(AccountStatus::Closed),
            other => Err(AccountError::UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_credit_and_debit() {
        let balance = Balance::new(1_000).credit(500).unwrap();
        assert_eq!(balance.value(), 1_500);

        let balance = balance.debit(1_500).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn test_balance_cannot_go_negative() {
        let err = Balance::new(100).debit(101).unwrap_err();
        assert!(matches!(
            err,
            AccountError::InsufficientFunds { balance: 100, requested: 101 }
        ));
    }

    #[test]
    fn test_balance_overflow_is_rejected() {
        assert!(matches!(
            Balance::new(u64::MAX).credit(1),
            Err(AccountError::BalanceOverflow)
        ));
        assert!(matches!(
            Balance::new(Balance::MAX).credit(1),
            Err(AccountError::BalanceOverflow)
        ));
        assert_eq!(Balance::new(Balance::MAX - 1).credit(1).unwrap().value(), Balance::MAX);
    }

    #[test]
    fn test_balance_display_in_major_units() {
        assert_eq!(Balance::new(50_005).to_string(), "500.05");
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [AccountStatus::Active, AccountStatus::Suspended, AccountStatus::Closed] {
            assert_eq!(status.as_str().parse::<AccountStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert!("FROZEN".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn test_account_id_parse() {
        let id = AccountId::generate();
        assert_eq!(id.to_string().parse::<AccountId>().unwrap(), id);
        assert!("not-a-uuid".parse::<AccountId>().is_err());
    }
}
