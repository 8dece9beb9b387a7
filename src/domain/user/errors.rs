use crate::event_sourcing::core::EventError;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Invalid full name")]
    InvalidFullName,

    #[error("Email is invalid: {0}")]
    InvalidEmail(String),

    #[error("Password hash cannot be empty")]
    MissingCredential,

    #[error("User has been deleted")]
    Deleted,

    #[error(transparent)]
    Event(#[from] EventError),
}
