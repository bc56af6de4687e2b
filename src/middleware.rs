//! Session middleware for axum.

use crate::{
    App, Backend, EmailSender, cookies::session_cookie_clear, tokens::session_token_validate,
};
use axum::{
    body::Body,
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

/// Session carried through request extensions.
///
/// Populated by [`session`] and consumed by [`CurrentUser`](crate::CurrentUser).
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionContext {
    /// User ID if a valid session cookie was presented.
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

/// Session middleware.
///
/// # Behavior
/// - **Valid session cookie**: injects an authenticated [`SessionContext`]
/// - **Invalid or expired cookie**: injects an anonymous context and clears the
///   cookie, unless the handler already set a new one
/// - **No cookie**: injects an anonymous context
pub async fn session<B: Backend, E: EmailSender>(
    State(app): State<App<B, E>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let config = app.config();
    let mut context = SessionContext::default();
    let mut stale = false;

    if let Some(cookie) = jar.get(&config.cookie_name)
        && !cookie.value().is_empty()
    {
        match session_token_validate(cookie.value(), config) {
            Ok(claims) => match Uuid::parse_str(&claims.sub) {
                Ok(user_id) => {
                    context.user_id = Some(user_id);
                    context.email = Some(claims.email);
                }
                Err(_) => stale = true,
            },
            Err(e) => {
                tracing::debug!(error = %e, "discarding invalid session cookie");
                stale = true;
            }
        }
    }

    request.extensions_mut().insert(context);

    let response = next.run(request).await;

    if !stale {
        return response;
    }

    let prefix = format!("{}=", config.cookie_name);
    let replaced = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .any(|v| v.to_str().is_ok_and(|v| v.starts_with(&prefix)));
    if replaced {
        return response;
    }

    (CookieJar::new().add(session_cookie_clear(config)), response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppConfig, CurrentUser, gateway::MemoryBackend, tokens::session_token_generate};
    use axum::{
        Router,
        http::{Request, StatusCode, header::COOKIE},
        routing::get,
    };
    use tower::util::ServiceExt;

    async fn whoami(user: CurrentUser) -> String {
        user.email
    }

    fn app() -> App<MemoryBackend> {
        let config = AppConfig {
            jwt_secret: "k".repeat(32),
            ..Default::default()
        };
        App::new(config, MemoryBackend::new()).unwrap()
    }

    fn router(app: &App<MemoryBackend>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                app.clone(),
                session::<MemoryBackend, ()>,
            ))
    }

    #[tokio::test]
    async fn valid_cookie_authenticates() {
        let app = app();
        let token =
            session_token_generate(Uuid::new_v4(), "a@b.co".to_string(), app.config()).unwrap();

        let response = router(&app)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(COOKIE, format!("lifex_session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthorized() {
        let app = app();
        let response = router(&app)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tampered_cookie_is_cleared() {
        let app = app();
        let response = router(&app)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(COOKIE, "lifex_session=not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cleared = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cleared.starts_with("lifex_session=;"));
    }
}
