//! Login, logout, current user and profile test functions.

use axum_extra::extract::cookie::Cookie;
use reqwest::{StatusCode, header};
use serde_json::json;

use crate::Backend;
use crate::handlers::{LOGIN_PATH, LOGOUT_PATH, ME_PATH, PROFILE_PATH, SessionResponse};

use super::{TestContext, TestUser, json_body};

/// Login sets an httpOnly session cookie that `/me` accepts.
pub async fn login_sets_session_cookie_and_me_returns_user<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::register(&base_url, &client).await;

    let response = client
        .post(format!("{base_url}{LOGIN_PATH}"))
        .json(&json!({ "email": user.email, "password": user.password }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let c = Cookie::parse(v.to_str().ok()?.to_string()).ok()?;
            (c.name() == config.cookie_name).then_some(c)
        })
        .expect("session cookie");
    assert_eq!(cookie.http_only(), Some(true));
    assert!(!cookie.value().is_empty());

    let body: SessionResponse = response.json().await.unwrap();
    assert_eq!(body.user.email, user.email);

    let stored = ctx
        .backend()
        .user_find_by_email(&user.email)
        .await
        .unwrap()
        .expect("user exists");
    assert!(stored.last_sign_in_at.is_some(), "login should record last_sign_in_at");

    let me = client
        .get(format!("{base_url}{ME_PATH}"))
        .header(header::COOKIE, format!("{}={}", config.cookie_name, cookie.value()))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let body: SessionResponse = me.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.user.id, stored.id);
    assert_eq!(body.user.username, user.username);
}

/// Wrong password and unknown email are both 401 with the same message.
pub async fn login_rejects_invalid_credentials<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;
    let user = TestUser::register(&base_url, &client).await;

    for (email, password) in [
        (user.email.as_str(), "WrongPass999"),
        ("nobody@example.com", "SecurePass123"),
    ] {
        let response = client
            .post(format!("{base_url}{LOGIN_PATH}"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.headers().get(header::SET_COOKIE), None);
        let body = json_body(response, StatusCode::UNAUTHORIZED).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

/// Protected routes reject missing and forged sessions.
pub async fn me_requires_session<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = client.get(format!("{base_url}{ME_PATH}")).send().await.unwrap();
    let body = json_body(response, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["error"], "Not authenticated");

    let response = client
        .get(format!("{base_url}{ME_PATH}"))
        .header(header::COOKIE, format!("{}=forged.jwt.value", ctx.config().cookie_name))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Logout answers with a cookie that expires the session.
pub async fn logout_clears_session_cookie<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::new(&base_url, &client, config).await;

    let response = client
        .post(format!("{base_url}{LOGOUT_PATH}"))
        .header(header::COOKIE, user.cookie_header(config))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cleared = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let c = Cookie::parse(v.to_str().ok()?.to_string()).ok()?;
            (c.name() == config.cookie_name).then_some(c)
        })
        .expect("clearing cookie");
    assert_eq!(cleared.value(), "");
    assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));

    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);
}

/// Profile fields are saved and returned.
pub async fn profile_update_changes_fields<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::new(&base_url, &client, config).await;

    let response = client
        .post(format!("{base_url}{PROFILE_PATH}"))
        .header(header::COOKIE, user.cookie_header(config))
        .json(&json!({
            "username": "  renamed ",
            "fullName": "Maria Silva",
            "bio": "Coffee hunter",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: SessionResponse = response.json().await.unwrap();
    assert_eq!(body.user.username, "renamed");
    assert_eq!(body.user.full_name.as_deref(), Some("Maria Silva"));
    assert_eq!(body.user.bio.as_deref(), Some("Coffee hunter"));
    assert_eq!(body.user.avatar_url, None);

    let stored = ctx
        .backend()
        .user_find_by_email(&user.email)
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(stored.username, "renamed");
}

/// Empty updates and blank usernames are rejected.
pub async fn profile_update_rejects_empty_request<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::new(&base_url, &client, config).await;

    for payload in [json!({}), json!({ "username": "   " })] {
        let response = client
            .post(format!("{base_url}{PROFILE_PATH}"))
            .header(header::COOKIE, user.cookie_header(config))
            .json(&payload)
            .send()
            .await
            .unwrap();
        let body = json_body(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["success"], false);
    }

    let response = client
        .post(format!("{base_url}{PROFILE_PATH}"))
        .json(&json!({ "bio": "no session" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
