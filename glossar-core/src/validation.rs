//! Input validation for account registration
//!
//! Lookups never validate: a login attempt with a malformed username is simply
//! an unknown account. These checks only guard what gets written to the store.
use crate::error::ValidationError;

/// Maximum username length in characters.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum password length in bytes, to bound hashing cost.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validates a username for a new account
///
/// # Username Requirements
///
/// - Cannot be empty
/// - No leading or trailing whitespace (usernames are matched case- and byte-exact)
/// - No control characters
/// - Maximum 64 characters
///
/// # Examples
///
/// ```rust
/// use glossar_core::validation::validate_username;
///
/// assert!(validate_username("alice").is_ok());
/// assert!(validate_username(" alice").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::MissingField(
            "Username is required".to_string(),
        ));
    }

    if username.trim() != username {
        return Err(ValidationError::InvalidUsername(
            "Username cannot start or end with whitespace".to_string(),
        ));
    }

    if username.chars().any(char::is_control) {
        return Err(ValidationError::InvalidUsername(
            "Username cannot contain control characters".to_string(),
        ));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be no more than {MAX_USERNAME_LENGTH} characters long"
        )));
    }

    Ok(())
}

/// Validates a password for a new account
///
/// Strength rules belong to the registration flow, which is not part of this
/// crate; only emptiness and an upper bound are enforced here.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be no more than {MAX_PASSWORD_LENGTH} characters long"
        )));
    }

    Ok(())
}
