//! Checks applied to user input before it is sent to the backend.

use crate::CoreError;

/// Word the user must type to confirm a purge.
pub const PURGE_CONFIRMATION: &str = "PURGE";

fn require(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn validate_signup(
    full_name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), CoreError> {
    require(full_name, "full name")?;
    require(email, "email")?;
    require(password, "password")?;
    if password != confirm_password {
        return Err(CoreError::Validation("passwords do not match".to_string()));
    }
    Ok(())
}

pub fn validate_reset(email: &str, new_password: &str) -> Result<(), CoreError> {
    require(email, "email")?;
    require(new_password, "new password")
}

pub fn validate_login(email: &str, password: &str) -> Result<(), CoreError> {
    require(email, "email")?;
    require(password, "password")
}

pub fn validate_contact(name: &str, email: &str, message: &str) -> Result<(), CoreError> {
    require(name, "name")?;
    require(email, "email")?;
    require(message, "message")
}

/// The purge only proceeds on the exact, case-sensitive confirmation word.
pub fn confirm_purge(input: &str) -> Result<(), CoreError> {
    if input.trim() != PURGE_CONFIRMATION {
        return Err(CoreError::Validation(format!(
            "type {} to confirm the purge",
            PURGE_CONFIRMATION
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rules() {
        assert!(validate_signup("Ana", "ana@example.org", "pw", "pw").is_ok());
        assert!(validate_signup("", "ana@example.org", "pw", "pw").is_err());
        assert!(validate_signup("Ana", "ana@example.org", "pw", "pW").is_err());
        assert!(validate_signup("Ana", "ana@example.org", " ", " ").is_err());
    }

    #[test]
    fn reset_and_contact_require_fields() {
        assert!(validate_reset("ana@example.org", "new").is_ok());
        assert!(validate_reset("ana@example.org", "").is_err());
        assert!(validate_contact("Ana", "ana@example.org", "  ").is_err());
        assert!(validate_login("", "pw").is_err());
    }

    #[test]
    fn purge_needs_exact_word() {
        assert!(confirm_purge("PURGE").is_ok());
        assert!(confirm_purge(" PURGE\n").is_ok());
        assert!(confirm_purge("purge").is_err());
        assert!(confirm_purge("").is_err());
    }
}
