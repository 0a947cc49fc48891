use chrono::Utc;

use super::aggregate::Account;
use super::errors::AccountError;
use super::events::*;
use super::snapshot::AccountSnapshot;
use super::value_objects::{AccountStatus, Balance};
use crate::event_sourcing::core::{EventEnvelope, RehydrateError, Rehydrator};

// ============================================================================
// Account Rehydrator
// ============================================================================
//
// Balances are recomputed from amounts on every replay (balance + amount,
// balance - amount). Events never carry the resulting balance.
//
// ============================================================================

pub struct AccountRehydrator;

impl AccountRehydrator {
    fn invalid(event: &EventEnvelope, err: AccountError) -> RehydrateError {
        RehydrateError::InvalidState {
            event_type: event.event_type.clone(),
            reason: err.to_string(),
        }
    }
}

impl Rehydrator for AccountRehydrator {
    type Aggregate = Account;
    type Snapshot = AccountSnapshot;

    const CREATION_EVENT: &'static str = event_types::ACCOUNT_CREATED;

    fn from_creation_event(event: &EventEnvelope) -> Result<Account, RehydrateError> {
        let created: AccountCreated = Self::payload(event)?;
        let balance = Balance::zero()
            .credit(created.initial_balance)
            .map_err(|err| Self::invalid(event, err))?;

        Ok(Account::restore(
            created.account_id,
            balance,
            created.status,
            created.created_at,
            event.occurred_at,
        ))
    }

    fn from_snapshot(snapshot: &AccountSnapshot) -> Result<Account, RehydrateError> {
        Ok(Account::restore(
            snapshot.account_id,
            Balance::new(snapshot.balance),
            snapshot.status,
            snapshot.created_at,
            snapshot.updated_at,
        ))
    }

    fn apply_event(account: &mut Account, event: &EventEnvelope) -> Result<(), RehydrateError> {
        match event.event_type.as_str() {
            event_types::MONEY_DEPOSITED => {
                let e: MoneyDeposited = Self::payload(event)?;
                account
                    .apply_deposit(e.amount)
                    .map_err(|err| Self::invalid(event, err))?;
            }
            event_types::MONEY_WITHDRAWN => {
                let e: MoneyWithdrawn = Self::payload(event)?;
                account
                    .apply_withdrawal(e.amount)
                    .map_err(|err| Self::invalid(event, err))?;
            }
            event_types::ACCOUNT_SUSPENDED => {
                let _: AccountSuspended = Self::payload(event)?;
                account.apply_status(AccountStatus::Suspended);
            }
            event_types::ACCOUNT_ACTIVATED => {
                let _: AccountActivated = Self::payload(event)?;
                account.apply_status(AccountStatus::Active);
            }
            event_types::ACCOUNT_CLOSED => {
                let _: AccountClosed = Self::payload(event)?;
                account.apply_status(AccountStatus::Closed);
            }
            event_types::ACCOUNT_CREATED => {
                return Err(RehydrateError::InvalidState {
                    event_type: event.event_type.clone(),
                    reason: "account already created".to_string(),
                })
            }
            other => return Err(RehydrateError::UnknownEventType(other.to_string())),
        }

        account.touch(event.occurred_at);
        Ok(())
    }

    fn create_snapshot(account: &Account, version: u64) -> AccountSnapshot {
        AccountSnapshot {
            account_id: account.id(),
            balance: account.balance().value(),
            status: account.status(),
            created_at: account.created_at(),
            updated_at: account.updated_at(),
            version,
            snapshot_at: Utc::now(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::value_objects::AccountId;
    use crate::event_sourcing::core::AggregateRoot;

    fn history() -> (Account, Vec<EventEnvelope>) {
        let mut account = Account::open(1_000).unwrap();
        account.deposit(500).unwrap();
        account.withdraw(200).unwrap();
        account.suspend().unwrap();
        account.activate().unwrap();
        account.deposit(50).unwrap();
        let events = account.uncommitted_events().to_vec();
        (account, events)
    }

    #[test]
    fn test_replay_recomputes_balance_from_amounts() {
        let (original, events) = history();

        let rebuilt = AccountRehydrator::rehydrate(&events).unwrap();
        assert_eq!(rebuilt.id(), original.id());
        assert_eq!(rebuilt.balance().value(), 1_350);
        assert_eq!(rebuilt.status(), AccountStatus::Active);
        assert_eq!(rebuilt.created_at(), original.created_at());
        assert_eq!(rebuilt.updated_at(), original.updated_at());
        assert_eq!(rebuilt.version(), 6);
        assert!(rebuilt.uncommitted_events().is_empty());
    }

    #[test]
    fn test_replay_ignores_extra_fields_in_payload() {
        let (_, mut events) = history();
        // A stale "balance_after" must not influence the fold.
        events[1].data["balance_after"] = serde_json::json!(999_999);

        let rebuilt = AccountRehydrator::rehydrate(&events).unwrap();
        assert_eq!(rebuilt.balance().value(), 1_350);
    }

    #[test]
    fn test_snapshot_at_every_position_matches_full_replay() {
        let (_, events) = history();
        let full = AccountRehydrator::rehydrate(&events).unwrap();

        for k in 1..events.len() {
            let at_k = AccountRehydrator::rehydrate(&events[..k]).unwrap();
            let snapshot = AccountRehydrator::create_snapshot(&at_k, k as u64);
            let resumed = AccountRehydrator::rehydrate_from_snapshot(&snapshot, &events[k..]).unwrap();

            assert_eq!(resumed.balance(), full.balance());
            assert_eq!(resumed.status(), full.status());
            assert_eq!(resumed.created_at(), full.created_at());
            assert_eq!(resumed.updated_at(), full.updated_at());
            assert_eq!(resumed.version(), full.version());
        }
    }

    #[test]
    fn test_withdrawal_below_zero_in_log_is_invalid_state() {
        let account = Account::open(10).unwrap();
        let mut events = account.uncommitted_events().to_vec();
        events.push(EventEnvelope::new(
            "account",
            account.id().to_string(),
            event_types::MONEY_WITHDRAWN,
            serde_json::json!({
                "account_id": account.id(),
                "amount": 11,
                "withdrawn_at": Utc::now(),
            }),
        ));

        let result = AccountRehydrator::rehydrate(&events);
        assert!(matches!(result, Err(RehydrateError::InvalidState { .. })));
    }

    #[test]
    fn test_unknown_event_type_fails_replay() {
        let id = AccountId::generate();
        let mut events = Account::open_with_id(id, 0).unwrap().uncommitted_events().to_vec();
        events.push(EventEnvelope::new("account", id.to_string(), "AccountRenamed", serde_json::json!({})));

        let result = AccountRehydrator::rehydrate(&events);
        assert!(matches!(result, Err(RehydrateError::UnknownEventType(t)) if t == "AccountRenamed"));
    }
}
