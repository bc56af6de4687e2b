//! Handler for getting current user information.

use crate::{
    App, Backend, CurrentUser, EmailSender, UserResponse,
    error::{AppError, ErrorResponse},
    handlers::login::SessionResponse,
};
use axum::{Json, Router, extract::State, routing::get};
use utoipa::OpenApi;

pub const ME_PATH: &str = "/api/auth/me";

#[derive(OpenApi)]
#[openapi(paths(me_get), components(schemas(SessionResponse, UserResponse, ErrorResponse)))]
pub(crate) struct MeApi;

/// Returns routes for the me endpoint.
pub fn me_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(ME_PATH, get(me_get::<B, E>))
}

/// Get the current authenticated user.
///
/// Loads the row so `emailVerified` reflects confirmations made after login.
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = OK, body = SessionResponse),
        (status = UNAUTHORIZED, body = ErrorResponse),
        (status = NOT_FOUND, body = ErrorResponse)
    )
)]
pub async fn me_get<B: Backend, E: EmailSender>(
    current_user: CurrentUser,
    State(app): State<App<B, E>>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = app
        .backend()
        .user_get_by_id(current_user.user_id)
        .await
        .map_err(AppError::from_backend)?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(SessionResponse {
        success: true,
        user: UserResponse::from(&user),
    }))
}
