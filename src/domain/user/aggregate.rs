use chrono::{DateTime, Utc};

use super::errors::UserError;
use super::events::*;
use super::value_objects::{Email, UserId, UserName, UserStatus};
use crate::event_sourcing::core::{AggregateRoot, DomainEvent, EventEnvelope, PendingEvents};

// ============================================================================
// User Aggregate - Domain Logic
// ============================================================================
//
// Lifecycle: register (PENDING_VERIFICATION) -> verify (VERIFIED).
// Verification is one-way and happens once.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    email: Email,
    name: UserName,
    status: UserStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    version: u64,
    pending: PendingEvents,
}

impl User {
    pub fn register(email: &str, name: &str) -> Result<Self, UserError> {
        Self::register_with_id(UserId::generate(), email, name)
    }

    pub fn register_with_id(id: UserId, email: &str, name: &str) -> Result<Self, UserError> {
        let email = Email::parse(email)?;
        let name = UserName::parse(name)?;
        let created_at = Utc::now();

        let mut user = Self::restore(
            id,
            email.clone(),
            name.clone(),
            UserStatus::PendingVerification,
            created_at,
            created_at,
        );
        user.record(&UserCreated {
            user_id: id,
            email,
            name,
            status: UserStatus::PendingVerification,
            created_at,
        })?;

        Ok(user)
    }

    pub(crate) fn restore(
        id: UserId,
        email: Email,
        name: UserName,
        status: UserStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            name,
            status,
            created_at,
            updated_at,
            version: 0,
            pending: PendingEvents::new(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn verify(&mut self) -> Result<(), UserError> {
        if !self.status.is_pending() {
            return Err(UserError::NotPendingVerification(self.status));
        }

        self.record(&UserVerified {
            user_id: self.id,
            verified_at: Utc::now(),
        })?;
        self.status = UserStatus::Verified;
        Ok(())
    }

    fn record<E: DomainEvent>(&mut self, event: &E) -> Result<(), UserError> {
        self.pending
            .record(Self::AGGREGATE_TYPE, self.id.to_string(), event)?;
        if let Some(recorded) = self.pending.as_slice().last() {
            self.updated_at = recorded.occurred_at;
        }
        Ok(())
    }

    pub(crate) fn apply_status(&mut self, status: UserStatus, occurred_at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = occurred_at;
    }
}

impl AggregateRoot for User {
    type Id = UserId;
    const AGGREGATE_TYPE: &'static str = "user";

    fn aggregate_id(&self) -> &UserId {
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
