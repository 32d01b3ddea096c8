use async_trait::async_trait;
use sqlx::PgPool;

use crate::accounts::model::{Account, AccountPatch, IdentityKey, NewAccount};
use crate::error::ApiError;

/// Credential store. Uniqueness of username/email/phone is enforced here (by
/// the database constraints in the Postgres adapter), so a race between two
/// signups claiming the same identity is settled by the store, not by the
/// service's pre-check.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, ApiError>;
    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<Account>, ApiError>;
    async fn create(&self, account: NewAccount) -> Result<Account, ApiError>;
    async fn update(&self, patch: AccountPatch) -> Result<Account, ApiError>;
    /// Record intent to delete; the row stays readable until the external
    /// purge job runs.
    async fn mark_for_deletion(&self, id: i64) -> Result<(), ApiError>;
}

pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, phone, password_hash, first_name, last_name, \
     status, created_at, password_updated_at, delete_requested_at";

fn map_create_error(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::AlreadyExists("account"),
        _ => ApiError::Database(e),
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, ApiError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<Account>, ApiError> {
        let (column, value) = match key {
            IdentityKey::Username(v) => ("username", v),
            IdentityKey::Email(v) => ("email", v),
            IdentityKey::Phone(v) => ("phone", v),
        };
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, ApiError> {
        let created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (username, email, phone, password_hash, first_name, last_name, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.status)
        .fetch_one(&self.db)
        .await
        .map_err(map_create_error)?;
        Ok(created)
    }

    async fn update(&self, patch: AccountPatch) -> Result<Account, ApiError> {
        let updated = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts SET
                username            = COALESCE($2, username),
                email               = COALESCE($3, email),
                phone               = COALESCE($4, phone),
                first_name          = COALESCE($5, first_name),
                last_name           = COALESCE($6, last_name),
                password_hash       = COALESCE($7, password_hash),
                password_updated_at = COALESCE($8, password_updated_at),
                status              = COALESCE($9, status),
                delete_requested_at = CASE WHEN $10 THEN NULL ELSE delete_requested_at END
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(patch.id)
        .bind(&patch.username)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.password_hash)
        .bind(patch.password_updated_at)
        .bind(patch.status)
        .bind(patch.clear_delete_request)
        .fetch_optional(&self.db)
        .await
        .map_err(map_create_error)?;

        updated.ok_or(ApiError::NotFound("account"))
    }

    async fn mark_for_deletion(&self, id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE accounts SET delete_requested_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("account"));
        }
        Ok(())
    }
}
