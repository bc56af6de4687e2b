//! Handler for profile updates.

use crate::{
    App, Backend, CurrentUser, EmailSender, ProfileUpdate, UserResponse,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
    handlers::login::SessionResponse,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

pub const PROFILE_PATH: &str = "/api/auth/profile";

#[derive(OpenApi)]
#[openapi(
    paths(profile_update),
    components(schemas(ProfileRequest, SessionResponse, UserResponse, ErrorResponse))
)]
pub(crate) struct ProfileApi;

/// Returns routes for the profile endpoint.
pub fn profile_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(PROFILE_PATH, post(profile_update::<B, E>))
}

/// Request body for a profile update. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl ProfileRequest {
    fn into_update(self) -> Result<ProfileUpdate, AppError> {
        let username = match self.username {
            Some(username) => {
                let username = username.trim();
                if username.is_empty() {
                    return Err(AppError::Validation("Username cannot be empty".to_string()));
                }
                Some(username.to_string())
            }
            None => None,
        };

        let update = ProfileUpdate {
            username,
            full_name: self.full_name.map(|v| v.trim().to_string()),
            avatar_url: self.avatar_url.map(|v| v.trim().to_string()),
            bio: self.bio,
        };

        if update.is_empty() {
            return Err(AppError::Validation(
                "At least one profile field is required".to_string(),
            ));
        }

        Ok(update)
    }
}

/// Update the current user's profile.
#[utoipa::path(
    post,
    path = "",
    request_body = ProfileRequest,
    responses(
        (status = OK, body = SessionResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = UNAUTHORIZED, body = ErrorResponse),
        (status = NOT_FOUND, body = ErrorResponse)
    )
)]
pub async fn profile_update<B: Backend, E: EmailSender>(
    current_user: CurrentUser,
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<ProfileRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let update = req.into_update()?;

    let user = app
        .backend()
        .user_profile_update(current_user.user_id, &update)
        .await
        .map_err(AppError::from_backend)?
        .ok_or(AppError::UserNotFound)?;

    tracing::info!(user_id = %user.id, "profile updated");

    Ok(Json(SessionResponse {
        success: true,
        user: UserResponse::from(&user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_is_rejected() {
        let err = ProfileRequest::default().into_update().unwrap_err();
        assert_eq!(err.to_string(), "At least one profile field is required");
    }

    #[test]
    fn blank_username_is_rejected() {
        let req = ProfileRequest {
            username: Some("   ".to_string()),
            bio: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(matches!(req.into_update(), Err(AppError::Validation(_))));
    }

    #[test]
    fn fields_are_trimmed() {
        let req = ProfileRequest {
            username: Some("  maria ".to_string()),
            full_name: Some(" Maria Silva ".to_string()),
            ..Default::default()
        };
        let update = req.into_update().unwrap();
        assert_eq!(update.username.as_deref(), Some("maria"));
        assert_eq!(update.full_name.as_deref(), Some("Maria Silva"));
        assert_eq!(update.avatar_url, None);
    }
}
