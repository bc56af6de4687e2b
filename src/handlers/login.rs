//! Handler for login.

use crate::{
    App, Backend, EmailSender, UserResponse,
    cookies::session_cookie_create,
    email::email_normalize,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
    password::password_verify,
    tokens::session_token_generate,
};
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub const LOGIN_PATH: &str = "/api/auth/login";

#[derive(OpenApi)]
#[openapi(
    paths(login),
    components(schemas(LoginRequest, SessionResponse, UserResponse, ErrorResponse))
)]
pub(crate) struct LoginApi;

/// Returns routes for the login endpoint.
pub fn login_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(LOGIN_PATH, post(login::<B, E>))
}

/// Request body for login.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response carrying the current user. Used by login, me and profile.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub user: UserResponse,
}

/// Log in with email and password.
///
/// Sets the session JWT as an httpOnly cookie. Returns `EmailNotConfirmed` when
/// `email_confirmation_require` is enabled and the address is unverified.
#[utoipa::path(
    post,
    path = "",
    request_body = LoginRequest,
    responses(
        (status = OK, body = SessionResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = UNAUTHORIZED, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn login<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let config = app.config();

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let email = email_normalize(&req.email)?;

    let user = app
        .backend()
        .user_find_by_email(&email)
        .await
        .map_err(AppError::from_backend)?
        .ok_or(AppError::InvalidCredentials)?;

    if !password_verify(&req.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    if config.email_confirmation_require && !user.email_verified {
        return Err(AppError::EmailNotConfirmed);
    }

    let token = session_token_generate(user.id, user.email.clone(), config)?;

    app.backend()
        .user_last_sign_in_update(user.id)
        .await
        .map_err(AppError::from_backend)?;

    tracing::info!(user_id = %user.id, "user logged in");

    let jar = CookieJar::new().add(session_cookie_create(token, config));

    Ok((
        jar,
        Json(SessionResponse {
            success: true,
            user: UserResponse::from(&user),
        }),
    )
        .into_response())
}
