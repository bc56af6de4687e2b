//! Handlers for redeeming email confirmation links.

use crate::{
    App, Backend, EmailSender, TokenKind,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
    verification::EMAIL_CONFIRM_LINK_PATH,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

/// Browser link target, `GET /auth/confirm?token=...`.
pub const CONFIRM_LINK_PATH: &str = EMAIL_CONFIRM_LINK_PATH;
/// JSON variant, `POST /api/auth/confirm`.
pub const CONFIRM_PATH: &str = "/api/auth/confirm";

#[derive(OpenApi)]
#[openapi(
    paths(confirm_get),
    components(schemas(ConfirmResponse, ErrorResponse))
)]
pub(crate) struct ConfirmLinkApi;

#[derive(OpenApi)]
#[openapi(
    paths(confirm_post),
    components(schemas(ConfirmRequest, ConfirmResponse, ErrorResponse))
)]
pub(crate) struct ConfirmApi;

/// Returns routes for both confirmation endpoints.
pub fn confirm_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new()
        .route(CONFIRM_LINK_PATH, get(confirm_get::<B, E>))
        .route(CONFIRM_PATH, post(confirm_post::<B, E>))
}

/// Token from the confirmation link.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub token: String,
}

/// Request body for JSON confirmation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub token: String,
}

/// Response for a redeemed confirmation token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmResponse {
    pub success: bool,
    pub message: String,
}

/// Confirm an email address from the browser link.
#[utoipa::path(
    get,
    path = "",
    params(ConfirmQuery),
    responses(
        (status = OK, body = ConfirmResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn confirm_get<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<ConfirmResponse>, AppError> {
    email_confirm_apply(&app, &query.token).await
}

/// Confirm an email address with a JSON body.
#[utoipa::path(
    post,
    path = "",
    request_body = ConfirmRequest,
    responses(
        (status = OK, body = ConfirmResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn confirm_post<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    email_confirm_apply(&app, &req.token).await
}

/// Consume an `email_verification` token and mark its user verified.
///
/// Unknown, expired and already-used tokens map to distinct 400 errors.
async fn email_confirm_apply<B: Backend, E: EmailSender>(
    app: &App<B, E>,
    token: &str,
) -> Result<Json<ConfirmResponse>, AppError> {
    if token.trim().is_empty() {
        return Err(AppError::Validation("Token is required".to_string()));
    }

    let user_id = app
        .confirmation()
        .verify_token(token, TokenKind::EmailVerification)
        .await?;

    let marked = app
        .backend()
        .user_mark_verified(user_id)
        .await
        .map_err(AppError::from_backend)?;
    if !marked {
        return Err(AppError::UserNotFound);
    }

    tracing::info!(%user_id, "email confirmed");

    Ok(Json(ConfirmResponse {
        success: true,
        message: "Email confirmed successfully.".to_string(),
    }))
}
