use super::errors::UserError;

// ============================================================================
// User Value Objects
// ============================================================================

pub const FULL_NAME_MIN_LEN: usize = 2;

/// Prefix of the placeholder credential set when a user is rehydrated
/// without a recoverable password hash.
pub const TEMPORARY_CREDENTIAL_PREFIX: &str = "TEMP_RESET_";

pub fn validate_full_name(full_name: &str) -> Result<String, UserError> {
    let trimmed = full_name.trim();
    if trimmed.chars().count() < FULL_NAME_MIN_LEN {
        return Err(UserError::InvalidFullName);
    }
    Ok(trimmed.to_string())
}

/// `local@domain.tld`, no whitespace. Stored lowercase.
pub fn validate_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(UserError::InvalidEmail(email));
    }
    Ok(email)
}

/// `TEMP_RESET_<first 8 chars of id>_<unix millis>`.
pub fn temporary_credential(user_id: &str, now_millis: i64) -> String {
    let prefix: String = user_id.chars().take(8).collect();
    format!("{TEMPORARY_CREDENTIAL_PREFIX}{prefix}_{now_millis}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert_eq!(validate_email(" Ana@Example.com ").unwrap(), "ana@example.com");
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ana@@example.com").is_err());
        assert!(validate_email("a na@example.com").is_err());
    }

    #[test]
    fn test_full_name_validation() {
        assert_eq!(validate_full_name("  Ana Silva ").unwrap(), "Ana Silva");
        assert!(matches!(validate_full_name(" A "), Err(UserError::InvalidFullName)));
    }

    #[test]
    fn test_temporary_credential_format() {
        let credential = temporary_credential("0123456789abcdef", 1_700_000_000_000);
        assert_eq!(credential, "TEMP_RESET_01234567_1700000000000");
        assert_eq!(temporary_credential("u1", 5), "TEMP_RESET_u1_5");
    }
}
