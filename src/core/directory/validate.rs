// src/core/directory/validate.rs

//! Field validators applied at the directory boundary.

use crate::core::AccessError;
use std::collections::BTreeSet;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const DISPLAY_NAME_MAX_LEN: usize = 100;

/// Usernames are 3 to 50 characters of ASCII letters, digits, `_` or `-`.
pub fn username(value: &str) -> Result<(), AccessError> {
    let len = value.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AccessError::InvalidUsername(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(AccessError::InvalidUsername(format!(
            "username may only contain letters, digits, '_' and '-' (found {c:?})"
        )));
    }
    Ok(())
}

/// Checks the length bound and normalizes the value: a display name that is
/// empty or only whitespace is stored as `None`.
pub fn display_name(value: Option<&str>) -> Result<Option<String>, AccessError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.chars().count() > DISPLAY_NAME_MAX_LEN {
        return Err(AccessError::InvalidDisplayName(format!(
            "display name must be at most {DISPLAY_NAME_MAX_LEN} characters"
        )));
    }
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.to_string()))
    }
}

/// Trims every tag and drops the ones left empty.
pub fn tags(values: BTreeSet<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .filter_map(|tag| {
            let trimmed = tag.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}
