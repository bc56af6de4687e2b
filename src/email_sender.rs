//! Email gateway abstraction.
//!
//! Implement [`EmailSender`] to deliver confirmation and password-reset
//! messages. [`ResendSender`] talks to the hosted transactional provider;
//! `()` is a no-op sender that always succeeds.

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

use crate::config::AppConfig;

/// A rendered message ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Gateway acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailReceipt {
    /// Provider message id.
    pub id: String,
}

/// Error type for email sending operations.
///
/// The variants only categorize the gateway's message for diagnostics. Callers
/// handle all of them the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailSendError {
    /// The gateway throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The API key was rejected.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The sender domain has not been verified with the provider.
    #[error("sender domain not verified: {0}")]
    UnverifiedDomain(String),

    /// Required gateway settings are missing.
    #[error("email gateway not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// Any other delivery failure.
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

impl EmailSendError {
    /// Categorize a gateway failure from its HTTP status and message.
    pub fn classify(status: Option<u16>, message: String) -> Self {
        let lower = message.to_ascii_lowercase();

        if status == Some(429)
            || lower.contains("rate limit")
            || lower.contains("too many requests")
        {
            return Self::RateLimited(message);
        }

        if lower.contains("domain")
            && (lower.contains("not verified") || lower.contains("verify"))
        {
            return Self::UnverifiedDomain(message);
        }

        if matches!(status, Some(401) | Some(403))
            || lower.contains("api key is invalid")
            || lower.contains("invalid api key")
        {
            return Self::InvalidCredentials(message);
        }

        match status {
            Some(status) => Self::Delivery(format!("status {status}: {message}")),
            None => Self::Delivery(message),
        }
    }

    /// The gateway's message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::RateLimited(m)
            | Self::InvalidCredentials(m)
            | Self::UnverifiedDomain(m)
            | Self::Delivery(m) => m.clone(),
            Self::NotConfigured(_) => self.to_string(),
        }
    }
}

/// Trait for async email delivery.
///
/// # Example
///
/// ```rust,ignore
/// use lifex::{EmailMessage, EmailReceipt, EmailSendError, EmailSender};
///
/// #[derive(Clone)]
/// struct MyEmailService { /* ... */ }
///
/// impl EmailSender for MyEmailService {
///     async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailSendError> {
///         // Queue or send email
///         Ok(EmailReceipt { id: "queued".into() })
///     }
/// }
/// ```
pub trait EmailSender: Send + Sync + Clone + 'static {
    /// Submit a message once. Implementations must not retry.
    fn send(
        &self,
        message: &EmailMessage,
    ) -> impl Future<Output = Result<EmailReceipt, EmailSendError>> + Send;

    /// Whether the sender has everything it needs to deliver.
    fn is_configured(&self) -> bool {
        true
    }
}

/// No-op email sender (default).
impl EmailSender for () {
    async fn send(&self, _message: &EmailMessage) -> Result<EmailReceipt, EmailSendError> {
        Ok(EmailReceipt {
            id: "noop".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ResendSendBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
    name: Option<String>,
}

/// Sender backed by the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendSender {
    client: reqwest::Client,
    api_key: Option<String>,
    from: Option<String>,
    base_url: String,
}

impl ResendSender {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        from: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            from,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a sender from `RESEND_API_KEY`, `EMAIL_FROM` and `RESEND_API_BASE_URL`.
    pub fn from_config(client: reqwest::Client, config: &AppConfig) -> Self {
        Self::new(
            client,
            config.email_api_key.clone(),
            config.email_from.clone(),
            config.email_api_base_url.clone(),
        )
    }
}

impl EmailSender for ResendSender {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailSendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmailSendError::NotConfigured("RESEND_API_KEY"))?;
        let from = self
            .from
            .as_deref()
            .ok_or(EmailSendError::NotConfigured("EMAIL_FROM"))?;

        let body = ResendSendBody {
            from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailSendError::classify(None, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<EmailReceipt>()
                .await
                .map_err(|e| EmailSendError::Delivery(format!("unreadable gateway reply: {e}")));
        }

        let raw = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ResendErrorBody>(&raw) {
            Ok(ResendErrorBody {
                message: Some(message),
                ..
            }) => message,
            Ok(ResendErrorBody {
                name: Some(name), ..
            }) => name,
            _ => raw,
        };

        Err(EmailSendError::classify(Some(status.as_u16()), message))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "maria@example.com".into(),
            subject: "Confirm your email".into(),
            html: "<p>hi</p>".into(),
            text: "hi".into(),
        }
    }

    fn sender(server: &MockServer) -> ResendSender {
        ResendSender::new(
            reqwest::Client::new(),
            Some("re_test".to_string()),
            Some("LifeX <hello@lifex.app>".to_string()),
            format!("{}/", server.base_url()),
        )
    }

    async fn send_with_reply(
        status: u16,
        body: &'static str,
    ) -> Result<EmailReceipt, EmailSendError> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/emails");
                then.status(status)
                    .header("content-type", "application/json")
                    .body(body);
            })
            .await;
        sender(&server).send(&message()).await
    }

    #[test]
    fn classify_rate_limit_by_status_and_text() {
        assert!(matches!(
            EmailSendError::classify(Some(429), "slow down".into()),
            EmailSendError::RateLimited(_)
        ));
        assert!(matches!(
            EmailSendError::classify(Some(400), "Rate limit exceeded".into()),
            EmailSendError::RateLimited(_)
        ));
    }

    #[test]
    fn classify_unverified_domain_before_credentials() {
        let err = EmailSendError::classify(
            Some(403),
            "The lifex.app domain is not verified. Please add and verify your domain".into(),
        );
        assert!(matches!(err, EmailSendError::UnverifiedDomain(_)));
    }

    #[test]
    fn classify_rejected_key() {
        assert!(matches!(
            EmailSendError::classify(Some(401), "API key is invalid".into()),
            EmailSendError::InvalidCredentials(_)
        ));
    }

    #[test]
    fn classify_keeps_gateway_message() {
        let err = EmailSendError::classify(Some(429), "Too many requests".into());
        assert_eq!(err.message(), "Too many requests");

        let err = EmailSendError::classify(Some(500), "boom".into());
        assert_eq!(err, EmailSendError::Delivery("status 500: boom".into()));
    }

    #[tokio::test]
    async fn resend_sender_without_key_is_not_configured() {
        let sender = ResendSender::new(reqwest::Client::new(), None, None, "http://localhost");
        assert!(!sender.is_configured());

        assert_eq!(
            sender.send(&message()).await.unwrap_err(),
            EmailSendError::NotConfigured("RESEND_API_KEY")
        );
    }

    #[tokio::test]
    async fn resend_posts_message_and_reads_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .header("authorization", "Bearer re_test")
                    .json_body(json!({
                        "from": "LifeX <hello@lifex.app>",
                        "to": ["maria@example.com"],
                        "subject": "Confirm your email",
                        "html": "<p>hi</p>",
                        "text": "hi",
                    }));
                then.status(200).json_body(json!({ "id": "49a3999c-0ce1" }));
            })
            .await;

        let receipt = sender(&server).send(&message()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.id, "49a3999c-0ce1");
    }

    #[tokio::test]
    async fn resend_error_message_is_classified() {
        let err = send_with_reply(
            429,
            r#"{"name":"rate_limit_exceeded","message":"Too many requests, slow down."}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EmailSendError::RateLimited(_)));
        assert_eq!(err.message(), "Too many requests, slow down.");
    }

    #[tokio::test]
    async fn resend_error_name_is_used_without_message() {
        let err = send_with_reply(403, r#"{"name":"invalid_api_key"}"#)
            .await
            .unwrap_err();
        assert_eq!(err, EmailSendError::InvalidCredentials("invalid_api_key".into()));
    }

    #[tokio::test]
    async fn resend_unparseable_replies_are_delivery_errors() {
        let err = send_with_reply(502, "bad gateway").await.unwrap_err();
        assert_eq!(err, EmailSendError::Delivery("status 502: bad gateway".into()));

        let err = send_with_reply(200, r#"{"unexpected":true}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, EmailSendError::Delivery(_)));
    }
}
