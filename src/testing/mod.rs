//! Reusable end-to-end test suite.
//!
//! Implement [`TestContext`] for a spawned server and storage of your choice,
//! then generate one `#[tokio::test]` per scenario with [`test_suite!`]:
//!
//! ```ignore
//! use lifex::testing::{RecordingSender, TestContext};
//!
//! struct MyContext { /* app state */ }
//!
//! impl TestContext for MyContext {
//!     type Backend = MyBackend;
//!
//!     async fn spawn() -> (String, reqwest::Client, Self) {
//!         // Start the app, return (base_url, client, context)
//!     }
//!     // ... other required methods
//! }
//!
//! lifex::test_suite!(MyContext);
//! ```
//!
//! [`test_suite!`]: crate::test_suite

pub mod confirmation;
pub mod diagnostics;
pub mod location;
pub mod password;
pub mod register;
pub mod session;

use axum_extra::extract::cookie::Cookie;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, header};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::{LOGIN_PATH, REGISTER_PATH};
use crate::{AppConfig, Backend, EmailMessage, EmailReceipt, EmailSendError, EmailSender};

/// Email sender that keeps every message in memory.
///
/// [`RecordingSender::fail_with`] makes subsequent sends fail without recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failure: Arc<Mutex<Option<EmailSendError>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send with `error` until [`RecordingSender::succeed`] is called.
    pub fn fail_with(&self, error: EmailSendError) {
        *self.failure.lock() = Some(error);
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    /// All delivered messages, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    /// Latest message delivered to `address`.
    pub fn last_to(&self, address: &str) -> Option<EmailMessage> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|m| m.to == address)
            .cloned()
    }
}

impl EmailSender for RecordingSender {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailSendError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let mut sent = self.sent.lock();
        sent.push(message.clone());
        Ok(EmailReceipt {
            id: format!("recorded-{}", sent.len()),
        })
    }
}

/// The opaque token from the first `token=` link in a message's text body.
pub fn link_token(message: &EmailMessage) -> Option<String> {
    let start = message.text.find("token=")? + "token=".len();
    let token: String = message.text[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Test user with credentials and, once logged in, a session token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub email: String,
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// Session cookie value. Empty until [`TestUser::login`].
    pub session: String,
}

impl TestUser {
    /// Register a fresh account without logging in.
    pub async fn register(base_url: &str, client: &Client) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let user = Self {
            email: format!("user+{id}@example.com"),
            username: format!("user_{}", &id[..8]),
            password: "SecurePass123".to_string(),
            session: String::new(),
        };

        let response = client
            .post(format!("{base_url}{REGISTER_PATH}"))
            .json(&json!({
                "email": user.email,
                "password": user.password,
                "username": user.username,
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(response.status(), StatusCode::OK, "registration failed");

        user
    }

    /// Register and log in.
    pub async fn new(base_url: &str, client: &Client, config: &AppConfig) -> Self {
        let mut user = Self::register(base_url, client).await;
        user.login(base_url, client, config).await;
        user
    }

    /// Log in and store the session cookie.
    pub async fn login(&mut self, base_url: &str, client: &Client, config: &AppConfig) {
        let response = client
            .post(format!("{base_url}{LOGIN_PATH}"))
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await
            .expect("login request");
        assert_eq!(response.status(), StatusCode::OK, "login failed");

        self.session = Self::extract_cookie(response.headers(), &config.cookie_name)
            .expect("session cookie set on login");
    }

    /// Find a cookie value in `Set-Cookie` response headers.
    pub fn extract_cookie(headers: &header::HeaderMap, name: &str) -> Option<String> {
        headers.get_all(header::SET_COOKIE).iter().find_map(|v| {
            let c = Cookie::parse(v.to_str().ok()?.to_string()).ok()?;
            (c.name() == name).then(|| c.value().to_string())
        })
    }

    /// `Cookie` request header for authenticated calls.
    pub fn cookie_header(&self, config: &AppConfig) -> String {
        format!("{}={}", config.cookie_name, self.session)
    }
}

/// Read a JSON body, asserting the status first.
pub async fn json_body(response: reqwest::Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}

/// Context trait that test implementations must provide.
///
/// Abstracts the concrete app so the suite runs against any [`Backend`].
pub trait TestContext: Sized + Send + Sync {
    type Backend: Backend;

    /// Spawn the app and return (base_url, http_client, context).
    fn spawn() -> impl Future<Output = (String, Client, Self)> + Send;

    fn config(&self) -> &AppConfig;

    /// Storage behind the spawned app, for assertions.
    fn backend(&self) -> &Self::Backend;

    /// Email sender wired into the spawned app.
    fn mailbox(&self) -> &RecordingSender;

    /// Move a stored token's expiry into the past.
    fn token_expire(&self, token_hash: &str) -> impl Future<Output = ()> + Send;
}

/// Test suite for LifeX.
///
/// Run all tests with `Suite::<YourContext>::test_all()`.
pub struct Suite<C: TestContext> {
    _marker: std::marker::PhantomData<C>,
}

impl<C: TestContext> Suite<C> {
    pub async fn test_all() {
        register::register_creates_unverified_user_and_sends_confirmation::<C>().await;
        register::register_enforces_minimum_password_length::<C>().await;
        register::register_rejects_duplicate_email::<C>().await;
        register::register_rejects_missing_fields_and_invalid_email::<C>().await;
        register::register_succeeds_when_email_gateway_is_rate_limited::<C>().await;

        confirmation::confirm_link_verifies_user_exactly_once::<C>().await;
        confirmation::confirm_post_accepts_json_token::<C>().await;
        confirmation::confirm_rejects_unknown_and_missing_tokens::<C>().await;
        confirmation::confirm_rejects_expired_token::<C>().await;
        confirmation::concurrent_confirm_succeeds_once::<C>().await;
        confirmation::resend_issues_new_working_link::<C>().await;
        confirmation::resend_does_not_reveal_accounts::<C>().await;

        password::password_reset_replaces_password::<C>().await;
        password::password_forgot_does_not_reveal_accounts::<C>().await;
        password::password_reset_rejects_confirmation_token::<C>().await;

        session::login_sets_session_cookie_and_me_returns_user::<C>().await;
        session::login_rejects_invalid_credentials::<C>().await;
        session::me_requires_session::<C>().await;
        session::logout_clears_session_cookie::<C>().await;
        session::profile_update_changes_fields::<C>().await;
        session::profile_update_rejects_empty_request::<C>().await;

        location::location_preferences_round_trip::<C>().await;
        location::location_preferences_validate_input::<C>().await;
        location::location_preferences_require_session::<C>().await;

        diagnostics::health_reports_ok::<C>().await;
        diagnostics::env_diagnostics_never_echo_values::<C>().await;
        diagnostics::email_diagnostics_report_sender::<C>().await;
    }
}

/// Generates one `#[tokio::test]` per suite scenario.
///
/// # Example
///
/// ```rust,ignore
/// lifex::test_suite!(MyContext);
/// ```
#[macro_export]
macro_rules! test_suite {
    (@tests $context:ty; $($module:ident :: $name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                $crate::testing::$module::$name::<$context>().await;
            }
        )*
    };
    ($context:ty) => {
        $crate::test_suite!(@tests $context;
            register::register_creates_unverified_user_and_sends_confirmation,
            register::register_enforces_minimum_password_length,
            register::register_rejects_duplicate_email,
            register::register_rejects_missing_fields_and_invalid_email,
            register::register_succeeds_when_email_gateway_is_rate_limited,
            confirmation::confirm_link_verifies_user_exactly_once,
            confirmation::confirm_post_accepts_json_token,
            confirmation::confirm_rejects_unknown_and_missing_tokens,
            confirmation::confirm_rejects_expired_token,
            confirmation::concurrent_confirm_succeeds_once,
            confirmation::resend_issues_new_working_link,
            confirmation::resend_does_not_reveal_accounts,
            password::password_reset_replaces_password,
            password::password_forgot_does_not_reveal_accounts,
            password::password_reset_rejects_confirmation_token,
            session::login_sets_session_cookie_and_me_returns_user,
            session::login_rejects_invalid_credentials,
            session::me_requires_session,
            session::logout_clears_session_cookie,
            session::profile_update_changes_fields,
            session::profile_update_rejects_empty_request,
            location::location_preferences_round_trip,
            location::location_preferences_validate_input,
            location::location_preferences_require_session,
            diagnostics::health_reports_ok,
            diagnostics::env_diagnostics_never_echo_values,
            diagnostics::email_diagnostics_report_sender,
        );
    };
}
