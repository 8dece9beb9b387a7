use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// User Domain Events
// ============================================================================
//
// Credentials never appear in user events.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event_type", content = "payload")]
pub enum UserEvent {
    #[serde(rename = "UserCreatedEvent")]
    Created(UserCreated),
    #[serde(rename = "UserLoggedInEvent")]
    LoggedIn(UserLoggedIn),
    #[serde(rename = "UserDeletedEvent")]
    Deleted(UserDeleted),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLoggedIn {
    pub full_name: String,
    pub email: String,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    pub full_name: String,
    pub email: String,
    pub deleted_at: DateTime<Utc>,
}

impl DomainEvent for UserEvent {
    const AGGREGATE_TYPE: &'static str = "User";
    const CREATED_EVENT_TYPE: &'static str = "UserCreatedEvent";

    fn known_event_types() -> &'static [&'static str] {
        &["UserCreatedEvent", "UserLoggedInEvent", "UserDeletedEvent"]
    }

    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "UserCreatedEvent",
            UserEvent::LoggedIn(_) => "UserLoggedInEvent",
            UserEvent::Deleted(_) => "UserDeletedEvent",
        }
    }
}
