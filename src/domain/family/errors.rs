use crate::event_sourcing::core::EventError;

// ============================================================================
// Family Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("Family name must have between {min} and {max} characters")]
    InvalidName { min: usize, max: usize },

    #[error("User is already a member of the family: {0}")]
    AlreadyMember(String),

    #[error("Member not found in the family: {0}")]
    MemberNotFound(String),

    #[error("The principal responsible member cannot be removed or demoted")]
    PrincipalResponsibleRequired,

    #[error("Family already has the maximum of {0} auxiliary responsible members")]
    TooManyAuxiliaryResponsibles(usize),

    #[error("Family has been deleted")]
    Deleted,

    #[error(transparent)]
    Event(#[from] EventError),
}
