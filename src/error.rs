use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::confirmation::ConfirmationError;

/// Failure envelope returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
}

/// Request, session, token and upstream errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Invalid or unknown token")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token already used")]
    TokenAlreadyConsumed,

    #[error("User not found")]
    UserNotFound,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Wrap a database gateway error.
    pub fn from_backend<E: std::error::Error>(error: E) -> Self {
        Self::Upstream(error.to_string())
    }

    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidEmail
            | AppError::WeakPassword(_)
            | AppError::UserAlreadyExists
            | AppError::TokenNotFound
            | AppError::TokenExpired
            | AppError::TokenAlreadyConsumed => StatusCode::BAD_REQUEST,
            AppError::Unauthorized
            | AppError::InvalidCredentials
            | AppError::EmailNotConfirmed
            | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::PasswordHash(_) | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ConfirmationError> for AppError {
    fn from(error: ConfirmationError) -> Self {
        match error {
            ConfirmationError::NotFound => AppError::TokenNotFound,
            ConfirmationError::Expired => AppError::TokenExpired,
            ConfirmationError::AlreadyConsumed => AppError::TokenAlreadyConsumed,
            ConfirmationError::Persistence(msg) => AppError::Upstream(msg),
            ConfirmationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Jwt(_) => AppError::Unauthorized.to_string(),
            AppError::PasswordHash(ref msg) => {
                tracing::error!("Password hashing error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_are_client_errors() {
        for err in [
            AppError::TokenNotFound,
            AppError::TokenExpired,
            AppError::TokenAlreadyConsumed,
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn upstream_detail_is_not_exposed() {
        let response = AppError::Upstream("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn confirmation_errors_map_to_token_errors() {
        assert!(matches!(
            AppError::from(ConfirmationError::AlreadyConsumed),
            AppError::TokenAlreadyConsumed
        ));
        assert!(matches!(
            AppError::from(ConfirmationError::Persistence("down".into())),
            AppError::Upstream(_)
        ));
    }
}
