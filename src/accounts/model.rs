use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::blogs::model::Blog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "account_status", rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

/// Account record as persisted. `blogs` is filled only when a profile is
/// enriched with its posts; it never round-trips to the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: AccountStatus,
    pub created_at: OffsetDateTime,
    pub password_updated_at: Option<OffsetDateTime>,
    pub delete_requested_at: Option<OffsetDateTime>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blogs: Vec<Blog>,
}

/// Identity fields as submitted by a caller. Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserInput {
    pub fn username(&self) -> Option<&str> {
        present(&self.username)
    }
    pub fn email(&self) -> Option<&str> {
        present(&self.email)
    }
    pub fn phone(&self) -> Option<&str> {
        present(&self.phone)
    }
    pub fn password(&self) -> Option<&str> {
        present(&self.password)
    }
    pub fn first_name(&self) -> Option<&str> {
        present(&self.first_name)
    }
    pub fn last_name(&self) -> Option<&str> {
        present(&self.last_name)
    }

    /// Resolve the single identity key used for lookups, priority
    /// username > email > phone.
    pub fn identity_key(&self) -> Option<IdentityKey> {
        if let Some(username) = self.username() {
            return Some(IdentityKey::Username(username.to_owned()));
        }
        if let Some(email) = self.email() {
            return Some(IdentityKey::Email(email.to_owned()));
        }
        self.phone().map(|p| IdentityKey::Phone(p.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.username().is_none()
            && self.email().is_none()
            && self.phone().is_none()
            && self.first_name().is_none()
            && self.last_name().is_none()
    }
}

/// One account lookup key. Lookups never combine identity fields; each query
/// targets exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKey {
    Username(String),
    Email(String),
    Phone(String),
}

/// Payload for account creation; the store assigns the ID.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: AccountStatus,
}

/// Field-by-field optional patch: `None` leaves the stored value untouched.
/// Clearing the deletion marker needs its own flag since `None` already means
/// "keep".
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub id: i64,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub password_updated_at: Option<OffsetDateTime>,
    pub status: Option<AccountStatus>,
    pub clear_delete_request: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_prefers_username_over_email_over_phone() {
        let input = UserInput {
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            phone: Some("+14155550100".into()),
            ..Default::default()
        };
        assert_eq!(
            input.identity_key(),
            Some(IdentityKey::Username("alice".into()))
        );

        let input = UserInput {
            email: Some("alice@example.com".into()),
            phone: Some("+14155550100".into()),
            ..Default::default()
        };
        assert_eq!(
            input.identity_key(),
            Some(IdentityKey::Email("alice@example.com".into()))
        );

        let input = UserInput {
            phone: Some("+14155550100".into()),
            ..Default::default()
        };
        assert_eq!(
            input.identity_key(),
            Some(IdentityKey::Phone("+14155550100".into()))
        );
    }

    #[test]
    fn blank_and_whitespace_fields_count_as_absent() {
        let input = UserInput {
            username: Some("   ".into()),
            email: Some(String::new()),
            ..Default::default()
        };
        assert!(input.identity_key().is_none());
        assert!(input.is_empty());
    }

    #[test]
    fn account_json_never_contains_the_password_hash() {
        let account = Account {
            id: 1,
            username: "alice".into(),
            email: None,
            phone: None,
            password_hash: "$argon2id$secret".into(),
            first_name: None,
            last_name: None,
            status: AccountStatus::Active,
            created_at: OffsetDateTime::UNIX_EPOCH,
            password_updated_at: None,
            delete_requested_at: None,
            blogs: Vec::new(),
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }
}
