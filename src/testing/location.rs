//! Location preferences test functions.

use reqwest::{StatusCode, header};
use serde_json::json;

use crate::handlers::LOCATION_PREFERENCES_PATH;

use super::{TestContext, TestUser, json_body};

/// Preferences are `null` until saved, then returned as saved.
pub async fn location_preferences_round_trip<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::new(&base_url, &client, config).await;
    let url = format!("{base_url}{LOCATION_PREFERENCES_PATH}");

    let response = client
        .get(&url)
        .header(header::COOKIE, user.cookie_header(config))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert!(body["preferences"].is_null());

    let response = client
        .post(&url)
        .header(header::COOKIE, user.cookie_header(config))
        .json(&json!({
            "city": "Lisbon",
            "country": "PT",
            "latitude": 38.7223,
            "longitude": -9.1393,
            "radiusKm": 10,
            "categories": ["cafe", "bookstore"],
        }))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["preferences"]["city"], "Lisbon");
    assert_eq!(body["preferences"]["radiusKm"], 10.0);

    let response = client
        .get(&url)
        .header(header::COOKIE, user.cookie_header(config))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    let preferences = &body["preferences"];
    assert_eq!(preferences["city"], "Lisbon");
    assert_eq!(preferences["country"], "PT");
    assert_eq!(preferences["latitude"], 38.7223);
    assert_eq!(preferences["categories"], json!(["cafe", "bookstore"]));
}

/// Location is required and coordinates and radius are range-checked.
pub async fn location_preferences_validate_input<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.config();
    let user = TestUser::new(&base_url, &client, config).await;
    let url = format!("{base_url}{LOCATION_PREFERENCES_PATH}");

    for payload in [
        json!({}),
        json!({ "latitude": 10.0 }),
        json!({ "latitude": 91.0, "longitude": 0.0 }),
        json!({ "latitude": 0.0, "longitude": 181.0 }),
        json!({ "city": "Porto", "radiusKm": 0 }),
        json!({ "city": "Porto", "radiusKm": 501 }),
    ] {
        let response = client
            .post(&url)
            .header(header::COOKIE, user.cookie_header(config))
            .json(&payload)
            .send()
            .await
            .unwrap();
        let body = json_body(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["success"], false, "payload {payload} should be rejected");
    }
}

/// Both verbs require a session.
pub async fn location_preferences_require_session<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;
    let url = format!("{base_url}{LOCATION_PREFERENCES_PATH}");

    let get = client.get(&url).send().await.unwrap();
    assert_eq!(get.status(), StatusCode::UNAUTHORIZED);

    let post = client
        .post(&url)
        .json(&json!({ "city": "Lisbon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), StatusCode::UNAUTHORIZED);
}
