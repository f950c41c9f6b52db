//! Write-path validation shared by template and instance models.

use crate::model::template::ClassType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}([0-9A-Fa-f]{2})?$").expect("valid color regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Validation failure raised before any SQL mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Business key is empty, contains whitespace, or starts with an
    /// all-digit dotted segment (reserved for the issuer prefix).
    InvalidId { field: &'static str, value: String },
    /// Colour is not `#RRGGBB` / `#RRGGBBAA`.
    InvalidColor(String),
    /// Holder email does not look like an address.
    InvalidEmail(String),
    /// Required text field is empty.
    MissingField { field: &'static str },
    /// Instance details shape does not match the template type.
    DetailsMismatch {
        expected: ClassType,
        actual: ClassType,
    },
    /// Patch sets a type-specific field that the template type does not have.
    ForeignField {
        class_type: ClassType,
        field: &'static str,
    },
    /// Patch tries to change a template's class type.
    ClassTypeChange { from: ClassType, to: ClassType },
    /// Patch carries no fields.
    EmptyPatch,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId { field, value } => write!(f, "invalid {field}: `{value}`"),
            Self::InvalidColor(value) => {
                write!(f, "invalid color `{value}`; expected #RRGGBB or #RRGGBBAA")
            }
            Self::InvalidEmail(value) => write!(f, "invalid holder email `{value}`"),
            Self::MissingField { field } => write!(f, "required field `{field}` is empty"),
            Self::DetailsMismatch { expected, actual } => write!(
                f,
                "instance details of type {actual} do not match template type {expected}"
            ),
            Self::ForeignField { class_type, field } => {
                write!(f, "field `{field}` does not apply to {class_type} templates")
            }
            Self::ClassTypeChange { from, to } => write!(
                f,
                "changing class type from {from} to {to} after creation is not supported"
            ),
            Self::EmptyPatch => write!(f, "no fields to update"),
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn check_id(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty()
        || value.chars().any(char::is_whitespace)
        || has_numeric_head_segment(value)
    {
        return Err(ModelValidationError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// `2026.SUMMER` would be read back as `SUMMER` once remote ids are stripped.
fn has_numeric_head_segment(value: &str) -> bool {
    value.split_once('.').is_some_and(|(head, tail)| {
        !head.is_empty() && !tail.is_empty() && head.bytes().all(|b| b.is_ascii_digit())
    })
}

pub(crate) fn check_color(value: Option<&str>) -> Result<(), ModelValidationError> {
    match value {
        Some(color) if !HEX_COLOR_RE.is_match(color) => {
            Err(ModelValidationError::InvalidColor(color.to_string()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_email(value: &str) -> Result<(), ModelValidationError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ModelValidationError::InvalidEmail(value.to_string()))
    }
}

pub(crate) fn check_required(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::MissingField { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_color, check_email, check_id, ModelValidationError};

    #[test]
    fn color_accepts_rgb_and_rgba_hex() {
        assert!(check_color(Some("#4285f4")).is_ok());
        assert!(check_color(Some("#4285F4CC")).is_ok());
        assert!(check_color(None).is_ok());
        assert!(matches!(
            check_color(Some("blue")),
            Err(ModelValidationError::InvalidColor(_))
        ));
    }

    #[test]
    fn email_requires_at_and_domain() {
        assert!(check_email("jane@example.com").is_ok());
        assert!(check_email("jane.example.com").is_err());
        assert!(check_email("jane@localhost").is_err());
    }

    #[test]
    fn ids_reject_blank_and_whitespace() {
        assert!(check_id("class_id", "EVT1").is_ok());
        assert!(check_id("class_id", "  ").is_err());
        assert!(check_id("class_id", "EVT 1").is_err());
    }

    #[test]
    fn ids_reject_issuer_like_numeric_head() {
        assert!(check_id("class_id", "2026.SUMMER").is_err());
        assert!(check_id("class_id", "SUMMER.2026").is_ok());
        assert!(check_id("class_id", "2026SUMMER").is_ok());
        assert!(check_id("class_id", "2026.").is_ok());
    }
}
