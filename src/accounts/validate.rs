use lazy_static::lazy_static;
use regex::Regex;

use crate::accounts::model::UserInput;
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // E.164: leading +, 8-15 digits, no leading zero.
    static ref PHONE_RE: Regex = Regex::new(r"^\+[1-9][0-9]{7,14}$").unwrap();
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::MissingParam("username"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::InvalidParam("username"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::MissingParam("email"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::InvalidParam("email"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ApiError> {
    if phone.is_empty() {
        return Err(ApiError::MissingParam("phone"));
    }
    if !PHONE_RE.is_match(phone) {
        return Err(ApiError::InvalidParam("phone"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::MissingParam("password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::InvalidParam("password"));
    }
    Ok(())
}

/// Signup validation: username and password are required, the other identity
/// fields are checked only when populated.
pub fn validate_new_user(user: &UserInput) -> Result<(), ApiError> {
    validate_username(user.username().unwrap_or(""))?;
    validate_password(user.password().unwrap_or(""))?;
    if let Some(email) = user.email() {
        validate_email(email)?;
    }
    if let Some(phone) = user.phone() {
        validate_phone(phone)?;
    }
    Ok(())
}
