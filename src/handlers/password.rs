//! Handlers for password reset.

use crate::{
    App, Backend, EmailSender, TokenKind,
    email::email_normalize,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
    password::{password_hash, password_validate},
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub const PASSWORD_PATH: &str = "/api/auth/password";
pub const PASSWORD_FORGOT_PATH: &str = "/api/auth/password/forgot";
pub const PASSWORD_RESET_PATH: &str = "/api/auth/password/reset";

/// Returned whether or not the address belongs to an account.
pub const PASSWORD_FORGOT_MESSAGE: &str =
    "If an account exists with that email, a password reset link has been sent.";

#[derive(OpenApi)]
#[openapi(
    paths(password_forgot, password_reset),
    components(schemas(
        PasswordForgotRequest,
        PasswordResetRequest,
        PasswordResponse,
        ErrorResponse
    ))
)]
pub(crate) struct PasswordApi;

/// Returns routes for password reset endpoints.
pub fn password_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new()
        .route(PASSWORD_FORGOT_PATH, post(password_forgot::<B, E>))
        .route(PASSWORD_RESET_PATH, post(password_reset::<B, E>))
}

/// Request body for forgot password.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordForgotRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for password reset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    /// Reset token from the email link.
    #[serde(default)]
    pub token: String,
    /// New password.
    #[serde(default)]
    pub password: String,
}

/// Response for both password endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResponse {
    pub success: bool,
    pub message: String,
}

/// Request a password reset email.
///
/// Token and delivery failures are logged, not returned, so the response never
/// reveals whether the account exists.
#[utoipa::path(
    post,
    path = "/forgot",
    request_body = PasswordForgotRequest,
    responses(
        (status = OK, body = PasswordResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn password_forgot<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<PasswordForgotRequest>,
) -> Result<Json<PasswordResponse>, AppError> {
    let email = email_normalize(&req.email)?;

    let user = app
        .backend()
        .user_find_by_email(&email)
        .await
        .map_err(AppError::from_backend)?;

    if let Some(user) = user {
        let confirmation = app.confirmation();
        match confirmation.issue_token(user.id, TokenKind::PasswordReset).await {
            Ok(issued) => {
                if let Err(e) = confirmation
                    .send_password_reset_email(&user.email, &user.username, &issued.token)
                    .await
                {
                    tracing::warn!(
                        user_id = %user.id,
                        error = ?e,
                        "failed to send password reset email"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user.id,
                    error = %e,
                    "failed to issue password reset token"
                );
            }
        }
    }

    Ok(Json(PasswordResponse {
        success: true,
        message: PASSWORD_FORGOT_MESSAGE.to_string(),
    }))
}

/// Set a new password using the token from the reset email.
///
/// The password is validated before the token is consumed, so a rejected
/// password leaves the link usable.
#[utoipa::path(
    post,
    path = "/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = OK, body = PasswordResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn password_reset<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<PasswordResetRequest>,
) -> Result<Json<PasswordResponse>, AppError> {
    if req.token.trim().is_empty() {
        return Err(AppError::Validation("Token is required".to_string()));
    }
    password_validate(&req.password, app.config())?;
    let hashed = password_hash(&req.password)?;

    let user_id = app
        .confirmation()
        .verify_token(&req.token, TokenKind::PasswordReset)
        .await?;

    let updated = app
        .backend()
        .user_password_update(user_id, &hashed)
        .await
        .map_err(AppError::from_backend)?;
    if !updated {
        return Err(AppError::UserNotFound);
    }

    tracing::info!(%user_id, "password reset");

    Ok(Json(PasswordResponse {
        success: true,
        message: "Password reset successfully. You can now log in with your new password."
            .to_string(),
    }))
}
