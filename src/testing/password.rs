//! Password reset test functions.

use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::handlers::{
    LOGIN_PATH, PASSWORD_FORGOT_MESSAGE, PASSWORD_FORGOT_PATH, PASSWORD_RESET_PATH,
};

use super::{TestContext, TestUser, json_body, link_token};

/// Forgot + reset replaces the password; the link works once.
pub async fn password_reset_replaces_password<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;

    let response = client
        .post(format!("{base_url}{PASSWORD_FORGOT_PATH}"))
        .json(&json!({ "email": user.email }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], PASSWORD_FORGOT_MESSAGE);

    let message = ctx.mailbox().last_to(&user.email).expect("reset email");
    assert!(message.text.contains("/auth/reset-password?token="));
    let token = link_token(&message).expect("token in link");

    // A weak password is rejected without burning the token.
    let response = client
        .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
        .json(&json!({ "token": token, "password": "123" }))
        .send()
        .await
        .unwrap();
    json_body(response, StatusCode::BAD_REQUEST).await;

    let response = client
        .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
        .json(&json!({ "token": token, "password": "BrandNew456" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);

    let old = client
        .post(format!("{base_url}{LOGIN_PATH}"))
        .json(&json!({ "email": user.email, "password": user.password }))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = client
        .post(format!("{base_url}{LOGIN_PATH}"))
        .json(&json!({ "email": user.email, "password": "BrandNew456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);

    let replay = client
        .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
        .json(&json!({ "token": token, "password": "Another789" }))
        .send()
        .await
        .unwrap();
    let body = json_body(replay, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Token already used");
}

/// Unknown addresses get the same answer and no email.
pub async fn password_forgot_does_not_reveal_accounts<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = client
        .post(format!("{base_url}{PASSWORD_FORGOT_PATH}"))
        .json(&json!({ "email": format!("ghost+{}@example.com", Uuid::new_v4().simple()) }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], PASSWORD_FORGOT_MESSAGE);
    assert!(ctx.mailbox().sent().is_empty());
}

/// A confirmation token cannot be used to reset a password.
pub async fn password_reset_rejects_confirmation_token<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let message = ctx.mailbox().last_to(&user.email).expect("confirmation email");
    let token = link_token(&message).expect("token in link");

    let response = client
        .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
        .json(&json!({ "token": token, "password": "BrandNew456" }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Invalid or unknown token");
}
