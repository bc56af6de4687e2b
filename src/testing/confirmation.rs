//! Email confirmation and resend test functions.

use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::handlers::{CONFIRM_LINK_PATH, CONFIRM_PATH, RESEND_MESSAGE, RESEND_PATH};
use crate::tokens::token_hash_sha256;
use crate::{Backend, EmailSendError};

use super::{TestContext, TestUser, json_body, link_token};

fn confirmation_token<C: TestContext>(ctx: &C, email: &str) -> String {
    let message = ctx.mailbox().last_to(email).expect("confirmation email");
    link_token(&message).expect("token in link")
}

async fn is_verified<C: TestContext>(ctx: &C, email: &str) -> bool {
    ctx.backend()
        .user_find_by_email(email)
        .await
        .expect("db query")
        .expect("user exists")
        .email_verified
}

/// The emailed link verifies the account, and a second click is rejected.
pub async fn confirm_link_verifies_user_exactly_once<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let token = confirmation_token(&ctx, &user.email);
    assert!(!is_verified(&ctx, &user.email).await);

    let url = format!("{base_url}{CONFIRM_LINK_PATH}?token={token}");

    let first = client.get(&url).send().await.unwrap();
    let body = json_body(first, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert!(is_verified(&ctx, &user.email).await);

    let second = client.get(&url).send().await.unwrap();
    let body = json_body(second, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Token already used");
}

/// `POST /api/auth/confirm` accepts the token in a JSON body.
pub async fn confirm_post_accepts_json_token<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let token = confirmation_token(&ctx, &user.email);

    let response = client
        .post(format!("{base_url}{CONFIRM_PATH}"))
        .json(&json!({ "token": token }))
        .send()
        .await
        .unwrap();
    json_body(response, StatusCode::OK).await;
    assert!(is_verified(&ctx, &user.email).await);
}

/// Unknown tokens and requests without a token are client errors.
pub async fn confirm_rejects_unknown_and_missing_tokens<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let unknown = "ab".repeat(32);
    let response = client
        .get(format!("{base_url}{CONFIRM_LINK_PATH}?token={unknown}"))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Invalid or unknown token");

    let response = client
        .get(format!("{base_url}{CONFIRM_LINK_PATH}"))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Token is required");
}

/// An expired token is rejected even though it was never used.
pub async fn confirm_rejects_expired_token<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let token = confirmation_token(&ctx, &user.email);

    ctx.token_expire(&token_hash_sha256(&token)).await;

    let response = client
        .get(format!("{base_url}{CONFIRM_LINK_PATH}?token={token}"))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Token expired");
    assert!(!is_verified(&ctx, &user.email).await);
}

/// Two simultaneous redemptions of one link: exactly one wins.
pub async fn concurrent_confirm_succeeds_once<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let token = confirmation_token(&ctx, &user.email);
    let url = format!("{base_url}{CONFIRM_PATH}");

    let (a, b) = tokio::join!(
        client.post(&url).json(&json!({ "token": token })).send(),
        client.post(&url).json(&json!({ "token": token })).send(),
    );

    let mut statuses = [a.unwrap().status(), b.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
    assert!(is_verified(&ctx, &user.email).await);
}

/// After a failed send, resend delivers a link that works.
pub async fn resend_issues_new_working_link<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    ctx.mailbox()
        .fail_with(EmailSendError::Delivery("gateway down".to_string()));
    let user = TestUser::register(&base_url, &client).await;
    assert!(ctx.mailbox().last_to(&user.email).is_none());

    ctx.mailbox().succeed();
    let response = client
        .post(format!("{base_url}{RESEND_PATH}"))
        .json(&json!({ "email": user.email }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], RESEND_MESSAGE);

    let token = confirmation_token(&ctx, &user.email);
    let response = client
        .get(format!("{base_url}{CONFIRM_LINK_PATH}?token={token}"))
        .send()
        .await
        .unwrap();
    json_body(response, StatusCode::OK).await;
    assert!(is_verified(&ctx, &user.email).await);
}

/// Unknown and already-verified addresses get the same answer and no email.
pub async fn resend_does_not_reveal_accounts<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;
    let token = confirmation_token(&ctx, &user.email);
    client
        .get(format!("{base_url}{CONFIRM_LINK_PATH}?token={token}"))
        .send()
        .await
        .unwrap();
    let sent_before = ctx.mailbox().sent().len();

    let unknown = format!("ghost+{}@example.com", Uuid::new_v4().simple());
    for email in [unknown.as_str(), user.email.as_str()] {
        let response = client
            .post(format!("{base_url}{RESEND_PATH}"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        let body = json_body(response, StatusCode::OK).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], RESEND_MESSAGE);
    }

    assert_eq!(ctx.mailbox().sent().len(), sent_before);
}
