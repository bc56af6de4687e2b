//! Handler for re-sending the confirmation email.

use crate::{
    App, Backend, EmailSender,
    email::email_normalize,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub const RESEND_PATH: &str = "/api/auth/resend-confirmation";

/// Returned whether or not the address belongs to an unverified account.
pub const RESEND_MESSAGE: &str =
    "If an unconfirmed account exists with that email, a new confirmation link has been sent.";

#[derive(OpenApi)]
#[openapi(
    paths(resend_confirmation),
    components(schemas(ResendRequest, ResendResponse, ErrorResponse))
)]
pub(crate) struct ResendApi;

/// Returns routes for the resend endpoint.
pub fn resend_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(RESEND_PATH, post(resend_confirmation::<B, E>))
}

/// Request body for resending confirmation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
}

/// Response for resending confirmation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResendResponse {
    pub success: bool,
    pub message: String,
}

/// Issue a fresh confirmation token and email it.
///
/// Earlier tokens stay valid until they expire. Always returns the same
/// message so the endpoint cannot be used to discover accounts.
#[utoipa::path(
    post,
    path = "",
    request_body = ResendRequest,
    responses(
        (status = OK, body = ResendResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn resend_confirmation<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<ResendRequest>,
) -> Result<Json<ResendResponse>, AppError> {
    let email = email_normalize(&req.email)?;

    let user = app
        .backend()
        .user_find_by_email(&email)
        .await
        .map_err(AppError::from_backend)?;

    if let Some(user) = user.filter(|u| !u.email_verified) {
        let delivery = app.confirmation().confirmation_deliver(&user).await;
        tracing::info!(user_id = %user.id, sent = delivery.sent, "confirmation resend attempted");
    }

    Ok(Json(ResendResponse {
        success: true,
        message: RESEND_MESSAGE.to_string(),
    }))
}
