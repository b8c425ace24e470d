//! Email identity and credential validation shared by every account boundary.
//!
//! Registration, login, reset request, reset confirmation and diagnostics all
//! go through [`normalize_email`] before touching a store, so two addresses
//! that differ only in case or surrounding whitespace always name the same
//! account.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 256;
const MAX_EMAIL_LEN: usize = 254;

/// Trim surrounding whitespace and lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize and check the shape of an email address.
pub fn parse_email(email: &str) -> Result<String, String> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return Err("Email is required".to_string());
    }
    if normalized.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(&normalized) {
        return Err("Invalid email address".to_string());
    }
    Ok(normalized)
}

pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}
