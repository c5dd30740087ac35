//! Input checks shared by the services

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ServiceError, ServiceResult};

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Digits with optional leading `+` and common separators
static PHONE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-.]{5,19}$").ok());

static PERIOD_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").ok());

fn matches(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().map_or(false, |re| re.is_match(value))
}

pub fn is_valid_email(email: &str) -> bool {
    matches(&EMAIL_RE, email.trim())
}

pub fn is_valid_phone(phone: &str) -> bool {
    matches(&PHONE_RE, phone.trim())
}

/// `YYYY-MM` payroll period
pub fn is_valid_period(period: &str) -> bool {
    matches(&PERIOD_RE, period)
}

/// Trimmed value, or a validation error naming the field
pub fn required(field: &str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{} cannot be empty", field)));
    }
    Ok(value.to_string())
}

/// Trim optional text; blank becomes `None`
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn email(value: &str) -> ServiceResult<String> {
    let value = value.trim().to_lowercase();
    if !is_valid_email(&value) {
        return Err(ServiceError::validation(format!("Invalid e-mail address: {}", value)));
    }
    Ok(value)
}

pub fn phone(value: Option<String>) -> ServiceResult<Option<String>> {
    match optional(value) {
        Some(p) if !is_valid_phone(&p) => {
            Err(ServiceError::validation(format!("Invalid phone number: {}", p)))
        }
        other => Ok(other),
    }
}

pub fn rating(value: i64) -> ServiceResult<i64> {
    if !(1..=5).contains(&value) {
        return Err(ServiceError::validation("Rating must be between 1 and 5"));
    }
    Ok(value)
}
