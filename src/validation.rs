use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn require_email(email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        return Err(AppError::bad_request("Invalid email"));
    }
    Ok(())
}

/// Length check in characters, inclusive on both ends.
pub fn require_len(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::bad_request(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}
