//! Handler for logout.

use crate::{
    App, Backend, EmailSender, cookies::session_cookie_clear, error::ErrorResponse,
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

pub const LOGOUT_PATH: &str = "/api/auth/logout";

#[derive(OpenApi)]
#[openapi(paths(logout), components(schemas(LogoutResponse, ErrorResponse)))]
pub(crate) struct LogoutApi;

/// Returns routes for the logout endpoint.
pub fn logout_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(LOGOUT_PATH, post(logout::<B, E>))
}

/// Response for logout.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Clear the session cookie.
///
/// Sessions are stateless JWTs, so a copied token stays valid until it expires.
#[utoipa::path(
    post,
    path = "",
    responses((status = OK, body = LogoutResponse))
)]
pub async fn logout<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    jar: CookieJar,
) -> Response {
    let jar = jar.add(session_cookie_clear(app.config()));

    (
        jar,
        Json(LogoutResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
        .into_response()
}
