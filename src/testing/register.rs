//! Registration test functions.

use reqwest::{StatusCode, header};
use serde_json::json;
use uuid::Uuid;

use crate::handlers::{REGISTER_PATH, RegisterResponse};
use crate::{Backend, EmailSendError};

use super::{TestContext, json_body, link_token};

fn unique_email() -> String {
    format!("user+{}@example.com", Uuid::new_v4().simple())
}

/// Registration persists an unverified user, emails a link and sets no session.
pub async fn register_creates_unverified_user_and_sends_confirmation<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let email = unique_email();

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": email, "password": "SecurePass123", "username": "maria" }))
        .send()
        .await
        .expect("register request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get_all(header::SET_COOKIE).iter().count(),
        0,
        "registration must not start a session"
    );

    let body: RegisterResponse = response.json().await.expect("register body");
    assert!(body.success);
    assert!(body.email_sent);
    assert_eq!(body.email_error, None);
    assert_eq!(body.user.email, email);
    assert_eq!(body.user.username, "maria");
    assert!(!body.user.email_verified);

    let stored = ctx
        .backend()
        .user_find_by_email(&email)
        .await
        .expect("db query")
        .expect("user persisted");
    assert!(!stored.email_verified);
    assert_ne!(stored.password_hash, "SecurePass123");

    let message = ctx.mailbox().last_to(&email).expect("confirmation email");
    assert!(message.text.contains("/auth/confirm?token="));
    let token = link_token(&message).expect("token in link");
    assert_eq!(token.len(), 64);
}

/// Five characters are rejected, six are accepted.
pub async fn register_enforces_minimum_password_length<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let email = unique_email();

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": email, "password": "12345", "username": "short" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("at least 6 characters")
    );
    assert!(
        ctx.backend()
            .user_find_by_email(&email)
            .await
            .unwrap()
            .is_none(),
        "rejected registration must not create a user"
    );

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": email, "password": "123456", "username": "short" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);
}

/// A second registration with the same email fails.
pub async fn register_rejects_duplicate_email<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;
    let email = unique_email();
    let payload = json!({ "email": email, "password": "SecurePass123", "username": "dup" });

    let first = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Case differences normalize to the same address.
    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({
            "email": email.to_uppercase(),
            "password": "SecurePass123",
            "username": "dup",
        }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "User already exists");
}

/// Missing fields and malformed emails fail validation.
pub async fn register_rejects_missing_fields_and_invalid_email<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": unique_email(), "password": "SecurePass123" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Email, password, and username are required");

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": "not-an-email", "password": "SecurePass123", "username": "x" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Invalid email format");

    assert!(ctx.mailbox().sent().is_empty(), "no email for rejected requests");
}

/// A throttled email gateway does not fail account creation.
pub async fn register_succeeds_when_email_gateway_is_rate_limited<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let gateway_message = "Too many requests. You can only make 2 requests per second.";
    ctx.mailbox().fail_with(EmailSendError::classify(
        Some(429),
        gateway_message.to_string(),
    ));
    let email = unique_email();

    let response = client
        .post(format!("{base_url}{REGISTER_PATH}"))
        .json(&json!({ "email": email, "password": "SecurePass123", "username": "busy" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["emailSent"], false);
    assert_eq!(body["emailError"], gateway_message);

    let stored = ctx
        .backend()
        .user_find_by_email(&email)
        .await
        .unwrap()
        .expect("account created despite email failure");
    assert!(!stored.email_verified);
}
