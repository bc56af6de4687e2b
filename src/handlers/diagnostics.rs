//! Configuration diagnostics. Reports presence of settings, never their values.

use crate::{App, Backend, EmailSender, EnvVarStatus, error::ErrorResponse};
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

pub const DIAGNOSTICS_PATH: &str = "/api/diagnostics";
pub const DIAGNOSTICS_ENV_PATH: &str = "/api/diagnostics/env";
pub const DIAGNOSTICS_EMAIL_PATH: &str = "/api/diagnostics/email";

#[derive(OpenApi)]
#[openapi(
    paths(diagnostics_env, diagnostics_email),
    components(schemas(EnvDiagnostics, EnvVarStatus, EmailDiagnostics, ErrorResponse))
)]
pub(crate) struct DiagnosticsApi;

/// Returns routes for diagnostics endpoints.
pub fn diagnostics_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new()
        .route(DIAGNOSTICS_ENV_PATH, get(diagnostics_env::<B, E>))
        .route(DIAGNOSTICS_EMAIL_PATH, get(diagnostics_email::<B, E>))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnvDiagnostics {
    pub success: bool,
    pub variables: Vec<EnvVarStatus>,
    /// Names of required variables that are not set.
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailDiagnostics {
    pub success: bool,
    /// Whether the email gateway has a key and a sender address.
    pub configured: bool,
    /// Domain part of the sender address.
    pub sender_domain: Option<String>,
    /// Origin used for links in emails.
    pub link_base_url: Option<String>,
}

/// Domain of a sender like `LifeX <hello@lifex.app>` or `hello@lifex.app`.
fn sender_domain(from: &str) -> Option<String> {
    let address = match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => &from[start + 1..end],
        _ => from,
    };
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
}

/// Presence of every recognised environment variable.
#[utoipa::path(get, path = "/env", responses((status = OK, body = EnvDiagnostics)))]
pub async fn diagnostics_env<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
) -> Json<EnvDiagnostics> {
    let variables = app.config().env_report();
    let missing = variables
        .iter()
        .filter(|v| v.required && !v.present)
        .map(|v| v.name)
        .collect();

    Json(EnvDiagnostics {
        success: true,
        variables,
        missing,
    })
}

/// Email gateway readiness.
#[utoipa::path(get, path = "/email", responses((status = OK, body = EmailDiagnostics)))]
pub async fn diagnostics_email<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
) -> Json<EmailDiagnostics> {
    let config = app.config();

    Json(EmailDiagnostics {
        success: true,
        configured: app.email_sender().is_configured(),
        sender_domain: config.email_from.as_deref().and_then(sender_domain),
        link_base_url: config.email_link_base_url.clone(),
    })
}
