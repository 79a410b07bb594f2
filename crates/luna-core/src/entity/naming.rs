//! Validation of user-provided entity names.

use crate::config::NameConfig;
use crate::error::{LunaError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// ASCII control characters other than tab, newline and carriage return.
static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());

/// Check that `name` is usable as an entity name.
///
/// # Rules
/// 1. Not empty after trimming whitespace
/// 2. At most `NameConfig::MAX_LENGTH` characters
/// 3. No control characters
/// 4. None of the reserved characters `< > " | / \ : * ?` (or NUL)
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| LunaError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().count() > NameConfig::MAX_LENGTH {
        return Err(invalid(&format!(
            "name is longer than {} characters",
            NameConfig::MAX_LENGTH
        )));
    }
    if CONTROL_CHARS.is_match(name) {
        return Err(invalid("name contains control characters"));
    }
    if let Some(c) = name.chars().find(|c| NameConfig::RESERVED_CHARS.contains(c)) {
        return Err(invalid(&format!("name contains reserved character {:?}", c)));
    }
    Ok(())
}

/// Boolean form of [`validate_name`].
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}
