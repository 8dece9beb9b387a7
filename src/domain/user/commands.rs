// ============================================================================
// User Commands
// ============================================================================

/// Credential checks happen before `RecordLogin` is issued.
#[derive(Debug, Clone)]
pub enum UserCommand {
    RecordLogin,
    DeleteUser,
}
