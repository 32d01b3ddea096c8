use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure in the service maps to exactly one of these kinds, so the
/// HTTP layer can pick a stable status code and a machine-readable tag.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("authentication failed: {0}")]
    Auth(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot read response body from {service}: {source}")]
    BodyRead {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot decode response from {service}: {source}")]
    Unmarshal {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable tag included in every error response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingParam(_) => "missing-param",
            ApiError::InvalidParam(_) => "invalid-param",
            ApiError::NotFound(_) => "entity-not-found",
            ApiError::AlreadyExists(_) => "entity-already-exists",
            ApiError::Auth(_) => "auth-error",
            ApiError::Database(_) => "db-error",
            ApiError::Hashing(_) => "hashing-error",
            ApiError::Transport { .. } => "transport-error",
            ApiError::BodyRead { .. } => "body-read-error",
            ApiError::Unmarshal { .. } => "unmarshal-error",
            ApiError::Storage(_) => "storage-error",
            ApiError::Internal(_) => "internal-error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_)
            | ApiError::InvalidParam(_)
            | ApiError::AlreadyExists(_)
            | ApiError::BodyRead { .. }
            | ApiError::Unmarshal { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Transport { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Database(_)
            | ApiError::Hashing(_)
            | ApiError::Storage(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        // Server-side failures get logged in full but are not echoed to the
        // client verbatim.
        let message = if status.is_server_error() {
            error!(kind, error = %self, "request failed");
            match self {
                ApiError::Database(_) => "database error".to_string(),
                ApiError::Hashing(_) => "password processing error".to_string(),
                ApiError::Storage(_) => "storage error".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failures_map_to_bad_request() {
        assert_eq!(
            ApiError::MissingParam("username").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidParam("otp").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::AlreadyExists("account").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn lookup_and_auth_failures_keep_their_status() {
        assert_eq!(
            ApiError::NotFound("account").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Auth("invalid password").status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn every_kind_has_a_distinct_tag() {
        let tags = [
            ApiError::MissingParam("x").kind(),
            ApiError::InvalidParam("x").kind(),
            ApiError::NotFound("x").kind(),
            ApiError::AlreadyExists("x").kind(),
            ApiError::Auth("x").kind(),
            ApiError::Hashing("x".into()).kind(),
            ApiError::Storage("x".into()).kind(),
            ApiError::Internal("x".into()).kind(),
        ];
        let mut unique = tags.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let response =
            ApiError::Hashing("argon2 blew up with secret context".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
