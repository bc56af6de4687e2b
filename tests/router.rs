//! In-process router tests for configuration-dependent behavior.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use lifex::testing::{RecordingSender, link_token};
use lifex::{App, AppConfig, gateway::MemoryBackend};
use serde_json::{Value, json};
use tower::ServiceExt;

fn config() -> AppConfig {
    AppConfig {
        jwt_secret: "router-test-secret-0123456789abcdef".to_string(),
        email_link_base_url: Some("https://lifex.app".to_string()),
        ..Default::default()
    }
}

fn router(config: AppConfig, backend: &MemoryBackend, mailbox: &RecordingSender) -> Router {
    App::new(config, backend.clone())
        .expect("valid config")
        .with_email_sender(mailbox.clone())
        .router()
}

async fn post(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(router, path, body.to_string()).await
}

async fn post_raw(router: &Router, path: &str, body: String) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn register(router: &Router, email: &str) -> Value {
    let (status, body) = post(
        router,
        "/api/auth/register",
        json!({ "email": email, "password": "SecurePass123", "username": "ana" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn login_requires_confirmation_when_enabled() {
    let backend = MemoryBackend::new();
    let mailbox = RecordingSender::new();
    let router = router(
        AppConfig {
            email_confirmation_require: true,
            ..config()
        },
        &backend,
        &mailbox,
    );

    register(&router, "ana@example.com").await;
    let credentials = json!({ "email": "ana@example.com", "password": "SecurePass123" });

    let (status, body) = post(&router, "/api/auth/login", credentials.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Email not confirmed");

    let token = link_token(&mailbox.last_to("ana@example.com").unwrap()).unwrap();
    let (status, _) = post(&router, "/api/auth/confirm", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&router, "/api/auth/login", credentials).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["emailVerified"], true);
}

#[tokio::test]
async fn registration_survives_token_store_failure() {
    let backend = MemoryBackend::new();
    let mailbox = RecordingSender::new();
    let router = router(config(), &backend, &mailbox);
    backend.token_writes_fail(true);

    let body = register(&router, "bo@example.com").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["emailSent"], false);
    assert!(body["emailError"].as_str().is_some());
    assert!(mailbox.sent().is_empty());

    backend.token_writes_fail(false);
    let (status, _) = post(
        &router,
        "/api/auth/resend-confirmation",
        json!({ "email": "bo@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(mailbox.last_to("bo@example.com").is_some());
}

#[tokio::test]
async fn confirmation_link_points_at_app_origin() {
    let backend = MemoryBackend::new();
    let mailbox = RecordingSender::new();
    let router = router(config(), &backend, &mailbox);

    register(&router, "cy@example.com").await;

    let message = mailbox.last_to("cy@example.com").unwrap();
    assert_eq!(message.subject, "Confirm your LifeX account");
    let token = link_token(&message).unwrap();
    assert!(
        message
            .text
            .contains(&format!("https://lifex.app/auth/confirm?token={token}"))
    );
    assert_eq!(backend.token_count(), 1);
}

#[tokio::test]
async fn malformed_bodies_use_error_envelope() {
    let backend = MemoryBackend::new();
    let mailbox = RecordingSender::new();
    let router = router(config(), &backend, &mailbox);

    let (status, body) = post(
        &router,
        "/api/auth/register",
        json!({ "email": 5, "password": "SecurePass123", "username": "ana" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = post_raw(&router, "/api/auth/login", "not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = post(
        &router,
        "/api/user/location-preferences",
        json!({ "latitude": "north" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    assert!(mailbox.sent().is_empty());
}
