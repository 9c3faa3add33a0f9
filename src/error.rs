use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Wire shape for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Closed set of failures the auth service can report. Every variant maps
/// to exactly one HTTP status and one stable machine-readable code.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    EmailTaken,

    #[error("User does not exist")]
    UnknownUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Invalid or expired verification token")]
    InvalidOrExpiredToken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AuthError::EmailTaken => (StatusCode::BAD_REQUEST, "email_taken"),
            AuthError::UnknownUser => (StatusCode::BAD_REQUEST, "unknown_user"),
            AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "invalid_credentials"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AuthError::InvalidOrExpiredToken => (StatusCode::BAD_REQUEST, "invalid_token"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        // Internal details stay in the logs; clients get a generic message.
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
