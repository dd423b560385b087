//! Form payloads and validation errors.
//!
//! Submitted forms arrive as flat string maps; validators turn them into typed
//! drafts or a [`FormErrors`] carrying field-level annotations. A rejected
//! submission is re-rendered with the original values intact, so validation
//! never crosses the handler boundary as a hard error.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Raw submitted form values, keyed by input name.
pub type FormData = HashMap<String, String>;

/// Field-level and form-level validation annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors {
    /// Per-field messages, keyed by input name
    pub fields: BTreeMap<String, String>,
    /// Messages not tied to a single field
    pub form: Vec<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    pub fn field(&mut self, name: &str, message: impl Into<String>) {
        self.fields.entry(name.to_string()).or_insert_with(|| message.into());
    }

    pub fn form_error(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    /// Convert into a result: `Ok(value)` when no annotation was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Fetch a trimmed, non-empty field or record a "required" annotation.
pub fn required<'a>(form: &'a FormData, name: &str, errors: &mut FormErrors) -> Option<&'a str> {
    match form.get(name).map(|s| s.trim()) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.field(name, "This field is required.");
            None
        }
    }
}

/// Fetch a trimmed field, treating absence as empty.
pub fn optional<'a>(form: &'a FormData, name: &str) -> &'a str {
    form.get(name).map(|s| s.trim()).unwrap_or_default()
}

/// Validate a new password pair against the configured policy. Records
/// annotations under `password1`/`password2`.
pub fn check_password_pair(form: &FormData, config: &crate::config::PasswordConfig, errors: &mut FormErrors) -> Option<String> {
    let password1 = form.get("password1").map(String::as_str).unwrap_or_default();
    let password2 = form.get("password2").map(String::as_str).unwrap_or_default();

    if password1.is_empty() {
        errors.field("password1", "This field is required.");
        return None;
    }
    if password1.len() < config.min_length {
        errors.field("password1", format!("Password must be at least {} characters.", config.min_length));
        return None;
    }
    if password1.len() > config.max_length {
        errors.field("password1", format!("Password must be no more than {} characters.", config.max_length));
        return None;
    }
    if password1 != password2 {
        errors.field("password2", "Passwords do not match.");
        return None;
    }

    Some(password1.to_string())
}

/// Drop secret fields before echoing a rejected submission back into a form.
pub fn sanitized(form: &FormData) -> FormData {
    form.iter()
        .filter(|(name, _)| !name.contains("password"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Very small sanity check; real validation is the confirmation email.
pub fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_required_records_annotation() {
        let mut errors = FormErrors::default();
        let data = form(&[("username", "  homer  "), ("email", "   ")]);

        assert_eq!(required(&data, "username", &mut errors), Some("homer"));
        assert_eq!(required(&data, "email", &mut errors), None);
        assert_eq!(required(&data, "missing", &mut errors), None);

        assert_eq!(errors.fields.len(), 2);
        assert_eq!(errors.fields["email"], "This field is required.");
    }

    #[test]
    fn test_password_pair_policy() {
        let config = PasswordConfig::default();

        let mut errors = FormErrors::default();
        let ok = check_password_pair(&form(&[("password1", "longenough"), ("password2", "longenough")]), &config, &mut errors);
        assert_eq!(ok.as_deref(), Some("longenough"));
        assert!(errors.is_empty());

        let mut errors = FormErrors::default();
        assert!(check_password_pair(&form(&[("password1", "short"), ("password2", "short")]), &config, &mut errors).is_none());
        assert!(errors.fields.contains_key("password1"));

        let mut errors = FormErrors::default();
        assert!(check_password_pair(&form(&[("password1", "longenough"), ("password2", "different1")]), &config, &mut errors).is_none());
        assert_eq!(errors.fields["password2"], "Passwords do not match.");
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("bart@example.com"));
        assert!(!looks_like_email("bart"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("bart@nodot"));
    }

    #[test]
    fn test_sanitized_strips_secret_fields() {
        let data = form(&[("username", "homer"), ("password1", "hunter22"), ("current_password", "x")]);
        let clean = sanitized(&data);
        assert_eq!(clean.len(), 1);
        assert!(clean.contains_key("username"));
    }

    #[test]
    fn test_into_result() {
        let errors = FormErrors::default();
        assert_eq!(errors.into_result(42), Ok(42));

        let mut errors = FormErrors::default();
        errors.form_error("broken");
        assert!(errors.into_result(42).is_err());
    }
}
