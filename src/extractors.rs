//! Request extractors.

use crate::{error::AppError, middleware::SessionContext};
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Authenticated user extractor.
///
/// Reads the [`SessionContext`] injected by [`crate::middleware::session`] and
/// rejects with [`AppError::Unauthorized`] when there is no valid session.
///
/// Does not load the account. Handlers that need the row query the backend.
///
/// # Example
///
/// ```rust,ignore
/// use lifex::CurrentUser;
///
/// async fn protected_route(user: CurrentUser) -> String {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<SessionContext>()
            .ok_or(AppError::Unauthorized)?;

        match (&context.user_id, &context.email) {
            (Some(user_id), Some(email)) => Ok(CurrentUser {
                user_id: *user_id,
                email: email.clone(),
            }),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// JSON request body whose rejections use the [`AppError`] envelope.
///
/// Any [`Json`] rejection becomes [`AppError::Validation`] (400) instead of
/// axum's plain-text response.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
