use chrono::Utc;

use super::aggregate::User;
use super::events::*;
use super::snapshot::UserSnapshot;
use super::value_objects::UserStatus;
use crate::event_sourcing::core::{EventEnvelope, RehydrateError, Rehydrator};

pub struct UserRehydrator;

impl Rehydrator for UserRehydrator {
    type Aggregate = User;
    type Snapshot = UserSnapshot;

    const CREATION_EVENT: &'static str = event_types::USER_CREATED;

    fn from_creation_event(event: &EventEnvelope) -> Result<User, RehydrateError> {
        // Email and name are revalidated while decoding
        let created: UserCreated = Self::payload(event)?;
        Ok(User::restore(
            created.user_id,
            created.email,
            created.name,
            created.status,
            created.created_at,
            event.occurred_at,
        ))
    }

    fn from_snapshot(snapshot: &UserSnapshot) -> Result<User, RehydrateError> {
        Ok(User::restore(
            snapshot.user_id,
            snapshot.email.clone(),
            snapshot.name.clone(),
            snapshot.status,
            snapshot.created_at,
            snapshot.updated_at,
        ))
    }

    fn apply_event(user: &mut User, event: &EventEnvelope) -> Result<(), RehydrateError> {
        match event.event_type.as_str() {
            event_types::USER_VERIFIED => {
                let _: UserVerified = Self::payload(event)?;
                user.apply_status(UserStatus::Verified, event.occurred_at);
                Ok(())
            }
            event_types::USER_CREATED => Err(RehydrateError::InvalidState {
                event_type: event.event_type.clone(),
                reason: "user already registered".to_string(),
            }),
            other => Err(RehydrateError::UnknownEventType(other.to_string())),
        }
    }

    fn create_snapshot(user: &User, version: u64) -> UserSnapshot {
        UserSnapshot {
            user_id: user.id(),
            email: user.email().clone(),
            name: user.name().clone(),
            status: user.status(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
            version,
            snapshot_at: Utc::now(),
        }
    }
}
