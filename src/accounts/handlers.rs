use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use crate::{
    accounts::dto::{
        AccountResponse, AuthResponse, AvailabilityRequest, LoginRequest, RefreshRequest,
        SendOtpRequest, SignupRequest, UpdatePasswordRequest, UpdateProfileRequest,
        VerifyPhoneRequest,
    },
    accounts::verify::OtpSession,
    auth::jwt::{AuthUser, JwtKeys},
    error::ApiError,
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/availability", post(check_availability))
        .route("/accounts/:username", get(get_profile))
        .route("/otp/send", post(send_otp))
        .route("/otp/verify", post(verify_phone))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/account",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/account/password", put(update_password))
}

fn token_pair(keys: &JwtKeys, account_id: i64) -> Result<(String, String), ApiError> {
    let access = keys.sign_access(account_id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e.to_string())
    })?;
    let refresh = keys.sign_refresh(account_id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e.to_string())
    })?;
    Ok((access, refresh))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let account = state.accounts.create(&payload.into()).await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, account.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            refresh_token,
            account: account.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let account = state.accounts.login(&payload.into()).await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, account.id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        account: account.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Auth("invalid refresh token"))?;

    let account = state
        .accounts
        .get_by_id(claims.sub)
        .await
        .map_err(|_| ApiError::Auth("account no longer exists"))?;

    let (access_token, refresh_token) = token_pair(&keys, account.id)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        account: account.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.accounts.get_by_id(subject).await?;
    Ok(Json(account.into()))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.accounts.get_account_with_blogs(&username).await?;
    Ok(Json(account.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.accounts.update_profile(subject, &payload.into()).await?;
    Ok(Json(account.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .update_password(subject, &payload.old_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete(subject).await?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, payload))]
pub async fn check_availability(
    State(state): State<AppState>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.accounts.check_availability(&payload.into()).await?;
    Ok(Json(json!({ "available": true })))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<OtpSession>, ApiError> {
    let session = state.accounts.send_otp(&payload.phone).await?;
    Ok(Json(session))
}

#[instrument(skip(state, payload))]
pub async fn verify_phone(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPhoneRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .accounts
        .verify_phone(&payload.session_id, &payload.otp, &payload.checks_url)
        .await?;
    Ok(Json(json!({ "verified": true })))
}
