//! Input validation shared by submission and party models.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// A submitted value that may never reach storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Rating outside the closed range 1..=5.
    RatingOutOfRange(i64),
    /// Field is required and blank after trimming.
    EmptyField(&'static str),
    /// Field does not look like an email address.
    InvalidEmail { field: &'static str, value: String },
    /// Follow-up consent was given without a contact address.
    MissingFollowUpEmail,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingOutOfRange(value) => {
                write!(f, "rating must be between 1 and 5, got {value}")
            }
            Self::EmptyField(field) => write!(f, "{field} cannot be empty"),
            Self::InvalidEmail { field, value } => {
                write!(f, "{field} is not a valid email address: `{value}`")
            }
            Self::MissingFollowUpEmail => {
                write!(f, "follow-up email is required when consent is given")
            }
        }
    }
}

impl Error for ValidationError {}

/// Checks `value` has the `local@domain.tld` shape.
pub fn validate_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail {
            field,
            value: value.to_string(),
        })
    }
}

/// Registry key for an address: trimmed and lowercased, so `A@X.com` and
/// `a@x.com` collide on the unique email index.
pub fn canonical_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Returns `value` trimmed, or an error when nothing is left.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// `None` for missing, empty or whitespace-only text.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}
