//! Form-level input validation
//!
//! Checks applied to request bodies before anything reaches the store.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// A rejected field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("phone regex is valid"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    })
}

/// Non-empty after trimming
pub fn require<'a>(field: &str, value: Option<&'a str>) -> ValidationResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, "is required")),
    }
}

/// Required string field of a JSON record
pub fn require_str<'a>(record: &'a serde_json::Map<String, Value>, field: &str) -> ValidationResult<&'a str> {
    require(field, record.get(field).and_then(Value::as_str))
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = require("email", Some(email))?;
    if email.len() > 254 || !email_regex().is_match(email) {
        return Err(ValidationError::new("email", "is not a valid email address"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = require("phone", Some(phone))?;
    if !phone_regex().is_match(phone) {
        return Err(ValidationError::new("phone", "is not a valid phone number"));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_length: usize) -> ValidationResult<()> {
    if password.chars().count() < min_length {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", min_length),
        ));
    }
    Ok(())
}

/// Non-negative, finite price
pub fn validate_price(price: f64) -> ValidationResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::new("price", "must be a non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require("name", Some("  Soup ")).unwrap(), "Soup");
        assert!(require("name", Some("   ")).is_err());
        let err = require("name", None).unwrap_err();
        assert_eq!(err.to_string(), "name: is required");
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+1 (555) 010-0199").is_ok());
        assert!(validate_phone("5550100").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("12345").is_err());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("owner@luigis.example").is_ok());
        assert!(validate_email("owner@").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("secret1", 6).is_ok());
        let err = validate_password("abc", 6).unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn test_price() {
        assert!(validate_price(9.99).is_ok());
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
    }
}
