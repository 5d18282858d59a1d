//! Profile name validation.
//!
//! Profile names end up in INI section headers and on the login program's
//! command line, so anything that could break either is rejected up front.

use crate::{BrokerError, Result};

/// Characters that would corrupt an INI section header.
const HEADER_CHARS: &str = "[]";

/// Maximum allowed length for profile names.
const MAX_NAME_LENGTH: usize = 255;

/// Validates a profile name for safety.
///
/// Rejects:
/// - Empty names
/// - Excessive length (>255 characters)
/// - Null bytes and control characters
/// - Section header brackets
/// - Leading or trailing whitespace
/// - A leading `-`, which the login program would parse as a flag
///
/// # Errors
///
/// Returns [`BrokerError::InvalidProfileName`] if validation fails.
///
/// # Example
///
/// ```
/// use ssobroker::validation::validate_profile_name;
///
/// assert!(validate_profile_name("work").is_ok());
/// assert!(validate_profile_name("prod-admin.eu").is_ok());
///
/// assert!(validate_profile_name("").is_err());
/// assert!(validate_profile_name("work]\n[default").is_err());
/// assert!(validate_profile_name("--debug").is_err());
/// ```
pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BrokerError::InvalidProfileName(
            "name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(BrokerError::InvalidProfileName(format!(
            "name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(BrokerError::InvalidProfileName(
            "name contains null byte".to_string(),
        ));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(BrokerError::InvalidProfileName(
            "name contains control characters".to_string(),
        ));
    }

    if name.chars().any(|c| HEADER_CHARS.contains(c)) {
        return Err(BrokerError::InvalidProfileName(
            "name contains section brackets".to_string(),
        ));
    }

    if name.trim() != name {
        return Err(BrokerError::InvalidProfileName(
            "name has leading or trailing whitespace".to_string(),
        ));
    }

    if name.starts_with('-') {
        return Err(BrokerError::InvalidProfileName(
            "name cannot start with '-'".to_string(),
        ));
    }

    Ok(())
}
