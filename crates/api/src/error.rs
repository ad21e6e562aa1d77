//! API error types
//!
//! Every expected authentication outcome is a variant here and maps to a
//! stable HTTP status plus a `{"error", "code"}` JSON body. Nothing in this
//! module is fatal to the process; all failures are per-request.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use markpad_shared::RateLimited;

use crate::auth::password::PolicyViolation;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address has not been verified")]
    EmailNotVerified,
    #[error("this email address is already registered")]
    EmailAlreadyExists,
    #[error("invalid or already used token")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("this email address is already verified")]
    EmailAlreadyVerified,
    #[error("invalid or expired access token")]
    InvalidAccessToken,
    #[error(transparent)]
    WeakPassword(#[from] PolicyViolation),
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("this account does not use password authentication")]
    NoPasswordSet,
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
    #[error("this sign-in method is currently disabled")]
    AuthModeDisabled,
    #[error("identity provider rejected the token")]
    UpstreamIdentityInvalid,
    #[error("authentication required")]
    MissingAuth,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::RateLimited(limited) = &self {
            let status = StatusCode::TOO_MANY_REQUESTS;
            let body = Json(json!({
                "error": "Too many attempts. Please wait before retrying.",
                "code": status.as_u16(),
            }));
            return (
                status,
                [(header::RETRY_AFTER, limited.retry_after_secs.to_string())],
                body,
            )
                .into_response();
        }

        let (status, message) = match &self {
            ApiError::InvalidCredentials | ApiError::WrongPassword => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::EmailNotVerified | ApiError::AuthModeDisabled => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ApiError::EmailAlreadyExists
            | ApiError::InvalidToken
            | ApiError::TokenExpired
            | ApiError::EmailAlreadyVerified
            | ApiError::WeakPassword(_)
            | ApiError::NoPasswordSet => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::UpstreamIdentityInvalid
            | ApiError::MissingAuth
            | ApiError::InvalidAccessToken
            | ApiError::RateLimited(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Database(e) => {
                tracing::error!(error = ?e, "request failed with database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_carries_retry_after_header() {
        let response = ApiError::RateLimited(RateLimited {
            retry_after_secs: 42,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[test]
    fn credential_failures_share_a_status() {
        // Unknown email and bad password must be indistinguishable to a caller
        let unknown = ApiError::InvalidCredentials.into_response();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn database_detail_is_not_leaked() {
        let response = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
