//! Input checks shared by the auth, user and admin handlers.

use serde_json::Value;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 100;

/// Trimmed and lower-cased, the form emails are stored and looked up in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Field is present and non-blank.
pub fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::field(field, format!("Please provide {}", field.replace('_', " ")))),
    }
}

/// Like [`required`] but returns the value untouched; passwords are never trimmed.
pub fn required_secret(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::field(field, format!("Please provide {}", field.replace('_', " ")))),
    }
}

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(ApiError::field("name", "Please tell us your name"));
    }
    if len > MAX_NAME_LEN {
        return Err(ApiError::field(
            "name",
            format!("Name must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

/// Basic structural check: one `@`, non-empty local part, dotted domain.
pub fn validate_email_format(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::field("email", "Please provide a valid email");

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::field(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if password != confirm {
        return Err(ApiError::field("password_confirm", "Passwords are not the same"));
    }
    Ok(())
}

/// Rejects bodies that try to change the password through a generic update route.
pub fn reject_password_fields(password: &Option<Value>, password_confirm: &Option<Value>) -> Result<(), ApiError> {
    if password.is_some() || password_confirm.is_some() {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /update-password.",
        ));
    }
    Ok(())
}
