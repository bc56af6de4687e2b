//! Liveness probe.

use crate::{App, Backend, EmailSender};
use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub const HEALTH_PATH: &str = "/api/health";

#[derive(OpenApi)]
#[openapi(paths(health), components(schemas(HealthResponse)))]
pub(crate) struct HealthApi;

/// Returns routes for the health endpoint.
pub fn health_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(HEALTH_PATH, get(health))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
}

#[utoipa::path(get, path = "", responses((status = OK, body = HealthResponse)))]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok".to_string(),
    })
}
