//! Input validation for service requests.
//!
//! Each check returns `Err(message)`; [`FieldErrors`] collects them per field
//! and turns the lot into a single [`ServiceError::Validation`].

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use super::ServiceError;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_AGE: i64 = 150;

lazy_static! {
    /// Digits with optional leading +, spaces, dots, dashes and parentheses
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 ().-]{4,22}$"
    ).unwrap();

    /// Usernames: letters, digits, dot, dash and underscore
    static ref USERNAME_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._-]{3,64}$"
    ).unwrap();
}

/// Collects validation failures across fields
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: HashMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one check against `field`
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.errors.entry(field.to_string()).or_default().push(message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ServiceError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.errors))
        }
    }
}

/// A required free-text field: non-blank and at most `max` characters
pub fn validate_required(label: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    if value.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

/// An optional free-text field: at most `max` characters when present
pub fn validate_optional(label: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

pub fn validate_age(age: i64) -> Result<(), String> {
    if age < 1 || age > MAX_AGE {
        return Err(format!("Age must be between 1 and {}", MAX_AGE));
    }
    Ok(())
}

/// Validate a phone number (optional field)
pub fn validate_phone_number(phone: Option<&str>) -> Result<(), String> {
    match phone {
        None => Ok(()),
        Some(p) if PHONE_REGEX.is_match(p.trim()) => Ok(()),
        Some(_) => Err("Invalid phone number format".to_string()),
    }
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-64 characters of letters, digits, '.', '-' or '_'".to_string(),
        );
    }
    Ok(())
}

pub fn validate_new_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    Ok(())
}
