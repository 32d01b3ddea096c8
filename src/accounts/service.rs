use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::accounts::model::{Account, AccountPatch, AccountStatus, IdentityKey, NewAccount, UserInput};
use crate::accounts::store::AccountStore;
use crate::accounts::validate;
use crate::accounts::verify::{EmailChecker, OtpSession, PhoneVerifier};
use crate::auth::password;
use crate::blogs::model::Blog;
use crate::error::ApiError;

/// The one cross-subsystem call the account layer makes: fetch every post
/// belonging to an account, unpaginated.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn posts_by_account(&self, account_id: i64) -> Result<Vec<Blog>, ApiError>;
}

/// Account lifecycle engine: signup, login, availability checks, profile and
/// password updates, soft deletion and OTP phone verification.
///
/// Operations acting on the authenticated account take the subject ID as an
/// explicit argument; the handler layer supplies it after verifying the
/// bearer token.
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    posts: Arc<dyn PostSource>,
    phone_verifier: Arc<dyn PhoneVerifier>,
    email_checker: Arc<dyn EmailChecker>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        posts: Arc<dyn PostSource>,
        phone_verifier: Arc<dyn PhoneVerifier>,
        email_checker: Arc<dyn EmailChecker>,
    ) -> Self {
        Self {
            store,
            posts,
            phone_verifier,
            email_checker,
        }
    }

    /// One store query per populated identity field; the first hit wins.
    async fn check_user_exists(&self, user: &UserInput) -> Result<(), ApiError> {
        let mut keys = Vec::new();
        if let Some(username) = user.username() {
            keys.push(IdentityKey::Username(username.to_owned()));
        }
        if let Some(email) = user.email() {
            keys.push(IdentityKey::Email(email.to_owned()));
        }
        if let Some(phone) = user.phone() {
            keys.push(IdentityKey::Phone(phone.to_owned()));
        }
        for key in &keys {
            if self.store.find_by_identity(key).await?.is_some() {
                warn!(?key, "signup identity already taken");
                return Err(ApiError::AlreadyExists("account"));
            }
        }
        Ok(())
    }

    /// Signup. The pre-check above is advisory; the store's uniqueness
    /// constraints settle concurrent signups racing for the same identity.
    pub async fn create(&self, user: &UserInput) -> Result<Account, ApiError> {
        self.check_user_exists(user).await?;
        validate::validate_new_user(user)?;

        if let Some(email) = user.email() {
            self.email_checker.check_deliverable(email).await?;
        }

        let username = user.username().ok_or(ApiError::MissingParam("username"))?;
        let plain = user.password().ok_or(ApiError::MissingParam("password"))?;
        let password_hash = password::hash_password(plain)?;

        let mut created = self
            .store
            .create(NewAccount {
                username: username.to_owned(),
                email: user.email().map(str::to_owned),
                phone: user.phone().map(str::to_owned),
                password_hash,
                first_name: user.first_name().map(str::to_owned),
                last_name: user.last_name().map(str::to_owned),
                status: AccountStatus::Active,
            })
            .await?;

        info!(account_id = created.id, username = %created.username, "account created");
        created.password_hash.clear();
        Ok(created)
    }

    /// Authenticate by whichever identity field is populated. A successful
    /// login cancels a pending deletion request and reactivates the account,
    /// so this read mutates state.
    pub async fn login(&self, user: &UserInput) -> Result<Account, ApiError> {
        if let Some(username) = user.username() {
            validate::validate_username(username)?;
        }
        if let Some(email) = user.email() {
            validate::validate_email(email)?;
        }
        if let Some(phone) = user.phone() {
            validate::validate_phone(phone)?;
        }

        let key = user.identity_key().ok_or(ApiError::MissingParam("login identity"))?;
        let plain = user.password().ok_or(ApiError::MissingParam("password"))?;

        let account = self
            .store
            .find_by_identity(&key)
            .await?
            .ok_or(ApiError::NotFound("account"))?;

        if !password::verify_password(plain, &account.password_hash)? {
            warn!(account_id = account.id, "login with invalid password");
            return Err(ApiError::Auth("invalid password"));
        }

        let mut refreshed = self
            .store
            .update(AccountPatch {
                id: account.id,
                status: Some(AccountStatus::Active),
                clear_delete_request: true,
                ..Default::default()
            })
            .await?;

        info!(account_id = refreshed.id, "login succeeded");
        refreshed.password_hash.clear();
        Ok(refreshed)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Account, ApiError> {
        let mut account = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("account"))?;
        account.password_hash.clear();
        Ok(account)
    }

    /// Profile view: the account plus its full post history. A failing post
    /// fetch fails the whole request; there is no partial-success tolerance.
    pub async fn get_account_with_blogs(&self, username: &str) -> Result<Account, ApiError> {
        validate::validate_username(username)?;

        let mut account = self
            .store
            .find_by_identity(&IdentityKey::Username(username.to_owned()))
            .await?
            .ok_or(ApiError::NotFound("account"))?;

        let posts = self.posts.posts_by_account(account.id).await?;
        account.blogs.extend(posts);
        account.password_hash.clear();
        Ok(account)
    }

    /// Field-by-field optional patch of the caller's own profile. The target
    /// ID is always the authenticated subject, never caller-supplied.
    pub async fn update_profile(&self, subject: i64, user: &UserInput) -> Result<Account, ApiError> {
        if user.is_empty() {
            return Err(ApiError::MissingParam("user details"));
        }
        if let Some(username) = user.username() {
            validate::validate_username(username)?;
        }
        if let Some(email) = user.email() {
            validate::validate_email(email)?;
        }
        if let Some(phone) = user.phone() {
            validate::validate_phone(phone)?;
        }

        // Surface a clean NotFound before attempting the patch.
        self.get_by_id(subject).await?;

        let mut updated = self
            .store
            .update(AccountPatch {
                id: subject,
                username: user.username().map(str::to_owned),
                email: user.email().map(str::to_owned),
                phone: user.phone().map(str::to_owned),
                first_name: user.first_name().map(str::to_owned),
                last_name: user.last_name().map(str::to_owned),
                ..Default::default()
            })
            .await?;

        info!(account_id = subject, "profile updated");
        updated.password_hash.clear();
        Ok(updated)
    }

    pub async fn update_password(
        &self,
        subject: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let account = self
            .store
            .find_by_id(subject)
            .await?
            .ok_or(ApiError::NotFound("account"))?;

        if !password::verify_password(old_password, &account.password_hash)? {
            warn!(account_id = subject, "password update with invalid old password");
            return Err(ApiError::Auth("invalid password"));
        }

        validate::validate_password(new_password)?;
        let password_hash = password::hash_password(new_password)?;

        self.store
            .update(AccountPatch {
                id: subject,
                password_hash: Some(password_hash),
                password_updated_at: Some(OffsetDateTime::now_utc()),
                ..Default::default()
            })
            .await?;

        info!(account_id = subject, "password updated");
        Ok(())
    }

    /// Record intent to delete. The data stays readable; an external job
    /// purges accounts whose request survives the grace period.
    pub async fn delete(&self, subject: i64) -> Result<(), ApiError> {
        self.store.mark_for_deletion(subject).await?;
        info!(account_id = subject, "account marked for deletion");
        Ok(())
    }

    /// Check whether a single identity is still free. Exactly one channel is
    /// consulted per call, priority username > email > phone; `Ok(())` means
    /// available.
    pub async fn check_availability(&self, user: &UserInput) -> Result<(), ApiError> {
        let key = user.identity_key().ok_or(ApiError::MissingParam("signup identity"))?;

        match &key {
            IdentityKey::Username(username) => validate::validate_username(username)?,
            IdentityKey::Email(email) => {
                validate::validate_email(email)?;
                self.email_checker.check_deliverable(email).await?;
            }
            IdentityKey::Phone(phone) => validate::validate_phone(phone)?,
        }

        if self.store.find_by_identity(&key).await?.is_some() {
            return Err(ApiError::AlreadyExists("account"));
        }
        Ok(())
    }

    /// Start phone verification. The returned session handle goes back to the
    /// client, which must echo it on the confirm step; nothing is persisted
    /// here.
    pub async fn send_otp(&self, phone: &str) -> Result<OtpSession, ApiError> {
        validate::validate_phone(phone)?;
        let session = self.phone_verifier.start_session(phone).await?;
        info!(session_id = %session.session_id, "verification code requested");
        Ok(session)
    }

    /// Confirm a phone verification code. Anything other than an approved
    /// session, including a denied or expired one, is an invalid OTP.
    pub async fn verify_phone(
        &self,
        session_id: &str,
        code: &str,
        checks_url: &str,
    ) -> Result<(), ApiError> {
        let approved = self
            .phone_verifier
            .confirm_session(session_id, code, checks_url)
            .await?;
        if !approved {
            return Err(ApiError::InvalidParam("otp"));
        }
        info!(session_id = %session_id, "phone verified");
        Ok(())
    }
}
