//! Health and diagnostics test functions.

use reqwest::StatusCode;

use crate::handlers::{DIAGNOSTICS_EMAIL_PATH, DIAGNOSTICS_ENV_PATH, HEALTH_PATH};

use super::{TestContext, json_body};

pub async fn health_reports_ok<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = client.get(format!("{base_url}{HEALTH_PATH}")).send().await.unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "ok");
}

/// The env report lists names and presence only.
pub async fn env_diagnostics_never_echo_values<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = client
        .get(format!("{base_url}{DIAGNOSTICS_ENV_PATH}"))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;

    let variables = body["variables"].as_array().expect("variables list");
    let secret = variables
        .iter()
        .find(|v| v["name"] == "AUTH_JWT_SECRET")
        .expect("jwt secret reported");
    assert_eq!(secret["present"], true);
    assert_eq!(secret["required"], true);

    assert!(
        !body.to_string().contains(&ctx.config().jwt_secret),
        "secret value must never be returned"
    );

    let missing: Vec<&str> = body["missing"]
        .as_array()
        .expect("missing list")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(!missing.contains(&"AUTH_JWT_SECRET"));
}

pub async fn email_diagnostics_report_sender<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = client
        .get(format!("{base_url}{DIAGNOSTICS_EMAIL_PATH}"))
        .send()
        .await
        .unwrap();
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["configured"], true);
    assert_eq!(
        body["linkBaseUrl"].as_str(),
        ctx.config().email_link_base_url.as_deref()
    );
}
