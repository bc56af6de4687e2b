//! OpenAPI generation for the LifeX HTTP surface.

use std::path::{Path, PathBuf};

use crate::handlers;
use thiserror::Error;
use utoipa::OpenApi;

/// OpenAPI document for all public endpoints.
#[derive(OpenApi)]
#[openapi(
    nest(
        (path = handlers::REGISTER_PATH, api = handlers::register::RegisterApi, tags = ["auth"]),
        (path = handlers::LOGIN_PATH, api = handlers::login::LoginApi, tags = ["auth"]),
        (path = handlers::LOGOUT_PATH, api = handlers::logout::LogoutApi, tags = ["auth"]),
        (path = handlers::ME_PATH, api = handlers::me::MeApi, tags = ["auth"]),
        (path = handlers::PROFILE_PATH, api = handlers::profile::ProfileApi, tags = ["auth"]),
        (
            path = handlers::CONFIRM_LINK_PATH,
            api = handlers::confirm::ConfirmLinkApi,
            tags = ["confirmation"]
        ),
        (
            path = handlers::CONFIRM_PATH,
            api = handlers::confirm::ConfirmApi,
            tags = ["confirmation"]
        ),
        (
            path = handlers::RESEND_PATH,
            api = handlers::resend::ResendApi,
            tags = ["confirmation"]
        ),
        (
            path = handlers::PASSWORD_PATH,
            api = handlers::password::PasswordApi,
            tags = ["auth"]
        ),
        (
            path = handlers::LOCATION_PREFERENCES_PATH,
            api = handlers::location::LocationApi,
            tags = ["user"]
        ),
        (
            path = handlers::DIAGNOSTICS_PATH,
            api = handlers::diagnostics::DiagnosticsApi,
            tags = ["diagnostics"]
        ),
        (path = handlers::HEALTH_PATH, api = handlers::health::HealthApi, tags = ["diagnostics"])
    ),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "confirmation", description = "Email confirmation tokens"),
        (name = "user", description = "User preferences"),
        (name = "diagnostics", description = "Health and configuration status")
    )
)]
pub struct LifexApiDoc;

/// OpenAPI generation and file-write errors.
#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("failed to serialize openapi spec: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to create docs directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write openapi spec at {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn openapi_build() -> utoipa::openapi::OpenApi {
    LifexApiDoc::openapi()
}

/// Generate the OpenAPI document as YAML.
pub fn openapi_yaml_generate() -> Result<String, OpenApiError> {
    Ok(serde_yaml::to_string(&openapi_build())?)
}

/// Write the OpenAPI YAML document to `path`, creating parent directories.
pub fn openapi_yaml_write(path: impl AsRef<Path>) -> Result<(), OpenApiError> {
    let path = path.as_ref();
    let docs_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    std::fs::create_dir_all(&docs_dir).map_err(|source| OpenApiError::CreateDir {
        path: docs_dir.clone(),
        source,
    })?;

    let spec = openapi_yaml_generate()?;
    std::fs::write(path, spec).map_err(|source| OpenApiError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Write `docs/openapi.yml` under the crate root and return the path.
pub fn openapi_yaml_write_default() -> Result<PathBuf, OpenApiError> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("docs")
        .join("openapi.yml");
    openapi_yaml_write(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let yaml = openapi_yaml_generate().expect("openapi yaml");
        for path in [
            "/api/auth/register",
            "/api/auth/login",
            "/auth/confirm",
            "/api/auth/confirm",
            "/api/auth/resend-confirmation",
            "/api/auth/password/forgot",
            "/api/auth/password/reset",
            "/api/user/location-preferences",
            "/api/diagnostics/env",
            "/api/health",
        ] {
            assert!(yaml.contains(path), "missing {path}");
        }
    }
}
