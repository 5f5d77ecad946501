//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum length of a Postgres identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Maximum length of a setting key.
pub const MAX_SETTING_KEY_LENGTH: usize = 100;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
    static ref SETTING_KEY_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").unwrap();
}

/// Returns true when `name` is safe to splice into SQL as a table or column name.
///
/// Only lowercase, unquoted-style identifiers are accepted.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_IDENTIFIER_LENGTH && IDENTIFIER_RE.is_match(name)
}

/// Validates a table or column identifier.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some(
            format!(
                "'{}' is not a valid identifier (lowercase letters, digits, underscores; max {} chars)",
                name, MAX_IDENTIFIER_LENGTH
            )
            .into(),
        );
        Err(err)
    }
}

/// Validates a setting key.
pub fn validate_setting_key(key: &str) -> Result<(), ValidationError> {
    if key.len() <= MAX_SETTING_KEY_LENGTH && SETTING_KEY_RE.is_match(key) {
        Ok(())
    } else {
        let mut err = ValidationError::new("setting_key_format");
        err.message = Some("Setting key must start with a letter and contain only letters, digits, '_', '.', '-'".into());
        Err(err)
    }
}

/// Validates a retention window expressed in days (1 to 3650).
pub fn validate_retention_days(days: u32) -> Result<(), ValidationError> {
    if (1..=3650).contains(&days) {
        Ok(())
    } else {
        let mut err = ValidationError::new("retention_range");
        err.message = Some("Retention must be between 1 and 3650 days".into());
        Err(err)
    }
}
