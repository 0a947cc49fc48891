use chrono::{DateTime, Utc};

use super::errors::AccountError;
use super::events::*;
use super::value_objects::{AccountId, AccountStatus, Balance};
use crate::event_sourcing::core::{AggregateRoot, DomainEvent, EventEnvelope, PendingEvents};

// ============================================================================
// Account Aggregate - Domain Logic
// ============================================================================
//
// Every operation validates first, then changes state and records exactly
// one event. A rejected operation leaves state and the pending buffer
// untouched.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    balance: Balance,
    status: AccountStatus,
    created_at: DateTime<Utc>,
    /// When the last applied event occurred.
    updated_at: DateTime<Utc>,

    version: u64,
    pending: PendingEvents,
}

impl Account {
    /// Open a new account with a fresh id.
    pub fn open(initial_balance: u64) -> Result<Self, AccountError> {
        Self::open_with_id(AccountId::generate(), initial_balance)
    }

    pub fn open_with_id(id: AccountId, initial_balance: u64) -> Result<Self, AccountError> {
        let created_at = Utc::now();
        let balance = Balance::zero().credit(initial_balance)?;
        let mut account = Self::restore(id, balance, AccountStatus::Active, created_at, created_at);

        account.record(&AccountCreated {
            account_id: id,
            initial_balance,
            status: AccountStatus::Active,
            created_at,
        })?;

        Ok(account)
    }

    /// Rebuild from known state without recording anything. Used by replay.
    pub(crate) fn restore(
        id: AccountId,
        balance: Balance,
        status: AccountStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            balance,
            status,
            created_at,
            updated_at,
            version: 0,
            pending: PendingEvents::new(),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deposit(&mut self, amount: u64) -> Result<(), AccountError> {
        Self::require_positive(amount)?;
        self.require_active()?;
        let balance = self.balance.credit(amount)?;

        self.record(&MoneyDeposited {
            account_id: self.id,
            amount,
            deposited_at: Utc::now(),
        })?;
        self.balance = balance;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: u64) -> Result<(), AccountError> {
        Self::require_positive(amount)?;
        self.require_active()?;
        let balance = self.balance.debit(amount)?;

        self.record(&MoneyWithdrawn {
            account_id: self.id,
            amount,
            withdrawn_at: Utc::now(),
        })?;
        self.balance = balance;
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), AccountError> {
        self.require_not_closed()?;

        self.record(&AccountSuspended {
            account_id: self.id,
            suspended_at: Utc::now(),
        })?;
        self.status = AccountStatus::Suspended;
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), AccountError> {
        self.require_not_closed()?;

        self.record(&AccountActivated {
            account_id: self.id,
            activated_at: Utc::now(),
        })?;
        self.status = AccountStatus::Active;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), AccountError> {
        self.require_not_closed()?;
        if !self.balance.is_zero() {
            return Err(AccountError::NonZeroBalance(self.balance.value()));
        }

        self.record(&AccountClosed {
            account_id: self.id,
            closed_at: Utc::now(),
        })?;
        self.status = AccountStatus::Closed;
        Ok(())
    }

    fn record<E: DomainEvent>(&mut self, event: &E) -> Result<(), AccountError> {
        self.pending
            .record(Self::AGGREGATE_TYPE, self.id.to_string(), event)?;
        if let Some(recorded) = self.pending.as_slice().last() {
            self.updated_at = recorded.occurred_at;
        }
        Ok(())
    }

    fn require_positive(amount: u64) -> Result<(), AccountError> {
        if amount == 0 {
            return Err(AccountError::NonPositiveAmount);
        }
        Ok(())
    }

    fn require_active(&self) -> Result<(), AccountError> {
        if !self.status.is_active() {
            return Err(AccountError::NotActive(self.status));
        }
        Ok(())
    }

    fn require_not_closed(&self) -> Result<(), AccountError> {
        if self.status.is_closed() {
            return Err(AccountError::AlreadyClosed);
        }
        Ok(())
    }

    // Replay-side transitions. They mirror the commands minus validation of
    // intent; only invariants that would corrupt state are rechecked.

    pub(crate) fn apply_deposit(&mut self, amount: u64) -> Result<(), AccountError> {
        self.balance = self.balance.credit(amount)?;
        Ok(())
    }

    pub(crate) fn apply_withdrawal(&mut self, amount: u64) -> Result<(), AccountError> {
        self.balance = self.balance.debit(amount)?;
        Ok(())
    }

    pub(crate) fn apply_status(&mut self, status: AccountStatus) {
        self.status = status;
    }

    pub(crate) fn touch(&mut self, occurred_at: DateTime<Utc>) {
        self.updated_at = occurred_at;
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;
    const AGGREGATE_TYPE: &'static str = "account";

    fn aggregate_id(&self) -> &AccountId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[EventEnvelope] {
        self.pending.as_slice()
    }

    fn mark_committed(&mut self, version: u64) {
        self.pending.clear();
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
