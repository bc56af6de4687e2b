//! Single-use confirmation tokens: issue, email, redeem, purge.
//!
//! Tokens are 32 random bytes, hex encoded. Only their SHA-256 is persisted.
//! Redemption is one conditional write at the backend, so two concurrent
//! requests for the same link cannot both succeed.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    backend::{Backend, ConfirmationToken, ConsumeOutcome, UserAccount},
    config::AppConfig,
    email_sender::{EmailReceipt, EmailSendError, EmailSender},
    templates::{confirmation_email_render, password_reset_email_render},
    tokens::{token_expiry_calculate, token_hash_sha256, token_with_hash_generate},
    verification::{
        EMAIL_CONFIRM_LINK_PATH, PASSWORD_RESET_LINK_PATH, TokenKind, verification_link_build,
    },
};

/// Token lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    #[error("token not found")]
    NotFound,

    #[error("token expired")]
    Expired,

    #[error("token already consumed")]
    AlreadyConsumed,

    #[error("token store failure: {0}")]
    Persistence(String),

    #[error("{0}")]
    Internal(String),
}

/// A freshly persisted token. `token` is the only copy of the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// What happened when a confirmation email was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationDelivery {
    pub sent: bool,
    pub error: Option<String>,
}

/// Issues, emails and redeems tokens for one request.
pub struct ConfirmationService<'a, B: Backend, E: EmailSender> {
    config: &'a AppConfig,
    backend: &'a B,
    email_sender: &'a E,
}

impl<'a, B: Backend, E: EmailSender> ConfirmationService<'a, B, E> {
    pub fn new(config: &'a AppConfig, backend: &'a B, email_sender: &'a E) -> Self {
        Self {
            config,
            backend,
            email_sender,
        }
    }

    /// Generate and persist a token for `user_id`.
    pub async fn issue_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
    ) -> Result<IssuedToken, ConfirmationError> {
        let (token, token_hash) = token_with_hash_generate();
        let now = Utc::now();
        let expires_at = token_expiry_calculate(now, kind.expiry(self.config))
            .map_err(|e| ConfirmationError::Internal(e.to_string()))?;

        let row = ConfirmationToken {
            token_hash,
            user_id,
            kind,
            created_at: now,
            expires_at,
            consumed_at: None,
        };

        self.backend
            .token_insert(&row)
            .await
            .map_err(|e| ConfirmationError::Persistence(e.to_string()))?;

        tracing::debug!(%user_id, %kind, %expires_at, "confirmation token issued");

        Ok(IssuedToken { token, expires_at })
    }

    /// Render and submit the account confirmation email. Not retried.
    pub async fn send_confirmation_email(
        &self,
        address: &str,
        username: &str,
        token: &str,
    ) -> Result<EmailReceipt, EmailSendError> {
        let link = verification_link_build(self.config, EMAIL_CONFIRM_LINK_PATH, token);
        let message = confirmation_email_render(
            address,
            username,
            &link,
            self.config.email_verification_token_expiry,
        );

        let receipt = self.email_sender.send(&message).await?;
        tracing::info!(email_id = %receipt.id, "confirmation email sent");
        Ok(receipt)
    }

    /// Render and submit the password reset email. Not retried.
    pub async fn send_password_reset_email(
        &self,
        address: &str,
        username: &str,
        token: &str,
    ) -> Result<EmailReceipt, EmailSendError> {
        let link = verification_link_build(self.config, PASSWORD_RESET_LINK_PATH, token);
        let message = password_reset_email_render(
            address,
            username,
            &link,
            self.config.password_reset_token_expiry,
        );

        let receipt = self.email_sender.send(&message).await?;
        tracing::info!(email_id = %receipt.id, "password reset email sent");
        Ok(receipt)
    }

    /// Issue an email-verification token and send it to `user`.
    ///
    /// Never fails: token persistence and gateway errors are logged and
    /// reported in the returned [`ConfirmationDelivery`]. The account stays
    /// unverified until a link is redeemed.
    pub async fn confirmation_deliver(&self, user: &UserAccount) -> ConfirmationDelivery {
        let issued = match self.issue_token(user.id, TokenKind::EmailVerification).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(
                    user_id = %user.id,
                    error = %e,
                    "failed to issue confirmation token"
                );
                return ConfirmationDelivery {
                    sent: false,
                    error: Some(e.to_string()),
                };
            }
        };

        match self
            .send_confirmation_email(&user.email, &user.username, &issued.token)
            .await
        {
            Ok(_) => ConfirmationDelivery {
                sent: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = ?e, "failed to send confirmation email");
                ConfirmationDelivery {
                    sent: false,
                    error: Some(e.message()),
                }
            }
        }
    }

    /// Redeem a token of `kind`, returning the user it was issued for.
    pub async fn verify_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Uuid, ConfirmationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfirmationError::NotFound);
        }

        let outcome = self
            .backend
            .token_consume(&token_hash_sha256(token), kind, Utc::now())
            .await
            .map_err(|e| ConfirmationError::Persistence(e.to_string()))?;

        match outcome {
            ConsumeOutcome::Consumed { user_id } => {
                tracing::info!(%user_id, %kind, "confirmation token consumed");
                Ok(user_id)
            }
            ConsumeOutcome::NotFound => Err(ConfirmationError::NotFound),
            ConsumeOutcome::Expired => Err(ConfirmationError::Expired),
            ConsumeOutcome::AlreadyConsumed => Err(ConfirmationError::AlreadyConsumed),
        }
    }

    /// Delete tokens that expired or were consumed more than `retention` ago.
    pub async fn purge_stale(&self, retention: Duration) -> Result<u64, ConfirmationError> {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| ConfirmationError::Internal("retention overflow".to_string()))?;

        self.backend
            .token_purge(cutoff)
            .await
            .map_err(|e| ConfirmationError::Persistence(e.to_string()))
    }
}
