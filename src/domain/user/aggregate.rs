use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::UserCommand;
use super::errors::UserError;
use super::events::*;
use super::value_objects::{validate_email, validate_full_name};
use crate::event_sourcing::core::{Aggregate, AggregateRoot, DomainEvent, EventError};

// ============================================================================
// User Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAggregate {
    root: AggregateRoot,

    pub full_name: String,
    pub email: String,
    pub login_count: u64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted: bool,

    // Snapshot-only state, not derivable from events
    password_hash: String,
    #[serde(default)]
    must_reset_password: bool,
}

impl UserAggregate {
    /// Register a user. `password_hash` is produced by the caller's hasher.
    pub fn create(user_id: &str, full_name: &str, email: &str, password_hash: &str) -> Result<Self, UserError> {
        if password_hash.is_empty() {
            return Err(UserError::MissingCredential);
        }

        let created_at = Utc::now();
        let created = UserEvent::Created(UserCreated {
            full_name: validate_full_name(full_name)?,
            email: validate_email(email)?,
            created_at,
        });

        let mut user = Self::apply_first_event(user_id, &created, created_at)?;
        user.password_hash = password_hash.to_string();
        user.root.record(&created)?;
        Ok(user)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn must_reset_password(&self) -> bool {
        self.must_reset_password
    }

    /// Attach a credential recovered outside the event log.
    pub fn restore_credentials(&mut self, password_hash: String, must_reset_password: bool) {
        self.password_hash = password_hash;
        self.must_reset_password = must_reset_password;
    }
}

impl Aggregate for UserAggregate {
    type Event = UserEvent;
    type Command = UserCommand;
    type Error = UserError;

    fn root(&self) -> &AggregateRoot {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot {
        &mut self.root
    }

    fn apply_first_event(
        aggregate_id: &str,
        event: &Self::Event,
        occurred_on: DateTime<Utc>,
    ) -> Result<Self, Self::Error> {
        match event {
            UserEvent::Created(e) => Ok(Self {
                root: AggregateRoot::restored(aggregate_id, e.created_at, occurred_on),
                full_name: e.full_name.clone(),
                email: e.email.clone(),
                login_count: 0,
                last_login_at: None,
                deleted: false,
                password_hash: String::new(),
                must_reset_password: false,
            }),
            _ => Err(EventError::NotCreationEvent {
                aggregate_id: aggregate_id.to_string(),
                event_type: event.event_type().to_string(),
                expected: UserEvent::CREATED_EVENT_TYPE,
            }
            .into()),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            UserEvent::Created(_) => {}
            UserEvent::LoggedIn(e) => {
                self.login_count += 1;
                self.last_login_at = Some(e.logged_in_at);
            }
            UserEvent::Deleted(_) => {
                self.deleted = true;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.deleted {
            return Err(UserError::Deleted);
        }

        let event = match command {
            UserCommand::RecordLogin => UserEvent::LoggedIn(UserLoggedIn {
                full_name: self.full_name.clone(),
                email: self.email.clone(),
                logged_in_at: Utc::now(),
            }),
            UserCommand::DeleteUser => UserEvent::Deleted(UserDeleted {
                full_name: self.full_name.clone(),
                email: self.email.clone(),
                deleted_at: Utc::now(),
            }),
        };
        Ok(vec![event])
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::Event;

    fn user() -> UserAggregate {
        UserAggregate::create("user-1", "Ana Silva", "ana@example.com", "$argon2id$hash").unwrap()
    }

    #[test]
    fn test_created_event_carries_no_credential() {
        let user = user();
        let payload = user.root().uncommitted_events()[0].payload();

        assert_eq!(payload["fullName"], "Ana Silva");
        assert_eq!(payload["email"], "ana@example.com");
        assert!(!payload.to_string().contains("argon2id"));
        assert_eq!(user.password_hash(), "$argon2id$hash");
    }

    #[test]
    fn test_create_requires_credential() {
        let result = UserAggregate::create("user-1", "Ana Silva", "ana@example.com", "");
        assert!(matches!(result, Err(UserError::MissingCredential)));
    }

    #[test]
    fn test_login_and_delete() {
        let mut user = user();
        user.execute(&UserCommand::RecordLogin).unwrap();
        user.execute(&UserCommand::RecordLogin).unwrap();
        user.execute(&UserCommand::DeleteUser).unwrap();

        assert_eq!(user.login_count, 2);
        assert!(user.last_login_at.is_some());
        assert!(user.deleted);
        assert_eq!(user.version(), 4);
        assert!(matches!(user.execute(&UserCommand::RecordLogin), Err(UserError::Deleted)));
    }

    #[test]
    fn test_rebuild_has_no_credential_until_restored() {
        let mut live = user();
        live.execute(&UserCommand::RecordLogin).unwrap();
        let history: Vec<Event> = live.root().uncommitted_events().to_vec();

        let mut rebuilt = UserAggregate::rebuild_from_events("user-1", &history).unwrap();
        assert_eq!(rebuilt.version(), 2);
        assert_eq!(rebuilt.login_count, 1);
        assert_eq!(rebuilt.password_hash(), "");

        rebuilt.restore_credentials("TEMP_RESET_user-1_1".to_string(), true);
        assert!(rebuilt.must_reset_password());
    }

    #[test]
    fn test_snapshot_keeps_credential() {
        let user = user();
        let json = serde_json::to_value(&user).unwrap();
        let restored: UserAggregate = serde_json::from_value(json).unwrap();

        assert_eq!(restored.password_hash(), "$argon2id$hash");
        assert!(!restored.must_reset_password());
    }
}
