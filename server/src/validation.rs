//! Field-level validation errors and the shared field checks.
//!
//! Validation failures are reported as a JSON object mapping each offending
//! field to its messages: `{"cooking_time": ["..."]}`. Errors that do not
//! belong to a single field go under `non_field_errors`.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use utoipa::ToSchema;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const EMPTY_LIST: &str = "This list may not be empty.";

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("invalid slug regex"));

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("invalid color regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("invalid username regex"));

/// Map of field name to validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for an error payload with a single message.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Check a required string field, returning the trimmed value when it passes.
pub fn required_text<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a str>,
    max_chars: Option<usize>,
) -> Option<&'a str> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, BLANK);
        return None;
    }

    if let Some(max) = max_chars {
        if trimmed.chars().count() > max {
            errors.add(field, max_length_message(max));
            return None;
        }
    }

    Some(trimmed)
}

pub fn max_length_message(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

pub fn is_valid_hex_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value)
}

pub fn is_valid_username(value: &str) -> bool {
    USERNAME_RE.is_match(value)
}

/// Minimal structural email check: one `@` with non-empty local part and a dotted domain.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .all(|part| !part.is_empty())
        && domain.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_field_map() {
        let mut errors = FieldErrors::new();
        errors.add("cooking_time", "too long");
        errors.add("cooking_time", "still too long");
        errors.add("name", "too short");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cooking_time": ["too long", "still too long"],
                "name": ["too short"],
            })
        );
    }

    #[test]
    fn into_result_is_ok_only_when_empty() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(FieldErrors::single("name", "bad").into_result().is_err());
    }

    #[test]
    fn required_text_reports_missing_blank_and_long_values() {
        let mut errors = FieldErrors::new();
        assert_eq!(required_text(&mut errors, "a", None, None), None);
        assert_eq!(required_text(&mut errors, "b", Some("   "), None), None);
        assert_eq!(required_text(&mut errors, "c", Some("abcdef"), Some(3)), None);
        assert_eq!(
            required_text(&mut errors, "d", Some("  ok  "), Some(3)),
            Some("ok")
        );

        assert_eq!(errors.get("a").unwrap(), [REQUIRED]);
        assert_eq!(errors.get("b").unwrap(), [BLANK]);
        assert_eq!(errors.get("c").unwrap(), [max_length_message(3)]);
        assert!(!errors.contains("d"));
    }

    #[test]
    fn slug_pattern() {
        assert!(is_valid_slug("breakfast"));
        assert!(is_valid_slug("late-night_snack2"));
        assert!(!is_valid_slug("with space"));
        assert!(!is_valid_slug("завтрак"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn hex_color_pattern() {
        assert!(is_valid_hex_color("#00ff7f"));
        assert!(is_valid_hex_color("#ABCDEF"));
        assert!(!is_valid_hex_color("00ff7f"));
        assert!(!is_valid_hex_color("#00ff7"));
        assert!(!is_valid_hex_color("#00ff7g"));
    }

    #[test]
    fn username_pattern() {
        assert!(is_valid_username("chef.anna+1@home"));
        assert!(!is_valid_username("chef anna"));
        assert!(!is_valid_username("chef/anna"));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("cook@example.com"));
        assert!(!is_valid_email("cook.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("cook@example"));
        assert!(!is_valid_email("cook@@example.com"));
        assert!(!is_valid_email("co ok@example.com"));
        assert!(!is_valid_email("cook@example..com"));
    }
}
