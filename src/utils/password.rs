use bcrypt::{DEFAULT_COST, hash, verify};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

// Short list of the most frequently breached passwords.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "11111111", "00000000", "abc12345",
    "letmein1", "welcome1", "admin123", "sunshine", "princess", "football",
    "baseball", "trustno1", "passw0rd", "superman", "1q2w3e4r", "zaq12wsx",
];

/// Password rules applied at signup: length, not all digits, not a common
/// password, not close to the account's own email or name.
pub fn validate_password(password: &str, email: &str, full_name: Option<&str>) -> AppResult<()> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(
            "This password is too long.".to_string(),
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::ValidationError(
            "This password is entirely numeric.".to_string(),
        ));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(AppError::ValidationError(
            "This password is too common.".to_string(),
        ));
    }

    let local_part = email.split('@').next().unwrap_or_default();
    let mut attributes: Vec<String> = vec![local_part.to_lowercase(), email.to_lowercase()];
    if let Some(name) = full_name {
        attributes.extend(name.split_whitespace().map(str::to_lowercase));
    }
    let too_similar = attributes
        .iter()
        .filter(|attr| attr.chars().count() >= 3)
        .any(|attr| lowered.contains(attr.as_str()) || attr.contains(lowered.as_str()));
    if too_similar {
        return Err(AppError::ValidationError(
            "The password is too similar to your personal information.".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password_confirmation(password1: &str, password2: &str) -> AppResult<()> {
    if password1 != password2 {
        return Err(AppError::ValidationError(
            "The two password fields didn't match.".to_string(),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {e}")))
}
