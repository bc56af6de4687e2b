//! Handler for account registration.

use crate::{
    App, Backend, EmailSender, NewUser, UserResponse,
    email::email_normalize,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
    password::{password_hash, password_validate},
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

pub const REGISTER_PATH: &str = "/api/auth/register";

#[derive(OpenApi)]
#[openapi(
    paths(register),
    components(schemas(RegisterRequest, RegisterResponse, UserResponse, ErrorResponse))
)]
pub(crate) struct RegisterApi;

/// Returns routes for the register endpoint.
pub fn register_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(REGISTER_PATH, post(register::<B, E>))
}

/// Request body for registration.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

/// Response for registration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
    /// Whether the confirmation email was accepted by the gateway.
    pub email_sent: bool,
    /// Gateway or token-store message when `email_sent` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_error: Option<String>,
}

/// Register a new account.
///
/// Creates an unverified user, issues an email-verification token and sends the
/// confirmation email. The account is created even if the token or email step
/// fails; `emailSent` and `emailError` report that outcome and the client can
/// call the resend endpoint later. No session cookie is set.
#[utoipa::path(
    post,
    path = "",
    request_body = RegisterRequest,
    responses(
        (status = OK, body = RegisterResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn register<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let username = req.username.trim();
    if req.email.trim().is_empty() || req.password.is_empty() || username.is_empty() {
        return Err(AppError::Validation(
            "Email, password, and username are required".to_string(),
        ));
    }

    let email = email_normalize(&req.email)?;
    password_validate(&req.password, app.config())?;

    let existing = app
        .backend()
        .user_find_by_email(&email)
        .await
        .map_err(AppError::from_backend)?;
    if existing.is_some() {
        return Err(AppError::UserAlreadyExists);
    }

    let new_user = NewUser {
        id: Uuid::new_v4(),
        email,
        username: username.to_string(),
        password_hash: password_hash(&req.password)?,
    };

    // The store's unique constraint decides races between concurrent registrations.
    let user = app
        .backend()
        .user_create(&new_user)
        .await
        .map_err(AppError::from_backend)?
        .ok_or(AppError::UserAlreadyExists)?;

    tracing::info!(user_id = %user.id, "account registered");

    let delivery = app.confirmation().confirmation_deliver(&user).await;

    let message = if delivery.sent {
        "Account created. Check your email to confirm your address."
    } else {
        "Account created, but the confirmation email could not be sent. You can request a new one."
    };

    Ok(Json(RegisterResponse {
        success: true,
        message: message.to_string(),
        user: UserResponse::from(&user),
        email_sent: delivery.sent,
        email_error: delivery.error,
    }))
}
