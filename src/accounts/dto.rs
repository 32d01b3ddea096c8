use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::accounts::model::{Account, AccountStatus, UserInput};
use crate::blogs::dto::BlogResponse;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<SignupRequest> for UserInput {
    fn from(req: SignupRequest) -> Self {
        UserInput {
            username: Some(req.username),
            email: req.email,
            phone: req.phone,
            password: Some(req.password),
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

/// Login accepts any one identity field alongside the password.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

impl From<LoginRequest> for UserInput {
    fn from(req: LoginRequest) -> Self {
        UserInput {
            username: req.username,
            email: req.email,
            phone: req.phone,
            password: Some(req.password),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UpdateProfileRequest> for UserInput {
    fn from(req: UpdateProfileRequest) -> Self {
        UserInput {
            username: req.username,
            email: req.email,
            phone: req.phone,
            first_name: req.first_name,
            last_name: req.last_name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<AvailabilityRequest> for UserInput {
    fn from(req: AvailabilityRequest) -> Self {
        UserInput {
            username: req.username,
            email: req.email,
            phone: req.phone,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPhoneRequest {
    pub session_id: String,
    pub otp: String,
    pub checks_url: String,
}

/// Returned after signup, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub account: AccountResponse,
}

/// Public view of an account. Unset optional fields are omitted and the
/// password hash is never part of this shape at all.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub status: AccountStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub password_updated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub delete_requested_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blogs: Vec<BlogResponse>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            phone: account.phone,
            first_name: account.first_name,
            last_name: account.last_name,
            status: account.status,
            created_at: account.created_at,
            password_updated_at: account.password_updated_at,
            delete_requested_at: account.delete_requested_at,
            blogs: account.blogs.into_iter().map(BlogResponse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: 7,
            username: "alice".into(),
            email: None,
            phone: Some("+14155550100".into()),
            password_hash: "$argon2id$v=19$secret".into(),
            first_name: Some("Alice".into()),
            last_name: None,
            status: AccountStatus::Active,
            created_at: OffsetDateTime::UNIX_EPOCH,
            password_updated_at: None,
            delete_requested_at: None,
            blogs: Vec::new(),
        }
    }

    #[test]
    fn response_omits_unset_fields_and_password() {
        let json = serde_json::to_string(&AccountResponse::from(account())).unwrap();
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("\"phone\":\"+14155550100\""));
        assert!(json.contains("\"status\":\"ACTIVE\""));
        assert!(!json.contains("email"));
        assert!(!json.contains("last_name"));
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("blogs"));
    }

    #[test]
    fn timestamps_serialize_as_rfc3339() {
        let json = serde_json::to_string(&AccountResponse::from(account())).unwrap();
        assert!(json.contains("\"created_at\":\"1970-01-01T00:00:00Z\""));
    }
}
