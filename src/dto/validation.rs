//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates a chat username: 1 to 32 ASCII letters, digits or underscores,
/// without a leading `@`.
///
/// # Examples
///
/// ```ignore
/// validate_username("ada_l")  // Ok
/// validate_username("@ada")   // Err - leading @
/// validate_username("a d a")  // Err - space
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.len() > 32 {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!(
                "Username must be 1 to 32 characters (got {})",
                username.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username must contain only ASCII letters, digits and underscores".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a text is not only whitespace.
pub fn validate_not_blank(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
