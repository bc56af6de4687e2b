//! Token kinds and confirmation link construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AppConfig;

/// What a confirmation token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Proves control of the registration email address.
    EmailVerification,
    /// Authorizes a single password change.
    PasswordReset,
}

impl TokenKind {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Lifetime of a freshly issued token of this kind.
    pub fn expiry(&self, config: &AppConfig) -> std::time::Duration {
        match self {
            Self::EmailVerification => config.email_verification_token_expiry,
            Self::PasswordReset => config.password_reset_token_expiry,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser path the email-confirmation link points at.
pub const EMAIL_CONFIRM_LINK_PATH: &str = "/auth/confirm";

/// Browser path the password-reset link points at.
pub const PASSWORD_RESET_LINK_PATH: &str = "/auth/reset-password";

/// Build a verification link URL for email templates.
///
/// If `email_link_base_url` is set in config, returns `{base_url}{path}?token={token}`.
/// Otherwise returns `{path}?token={token}`.
pub fn verification_link_build(config: &AppConfig, path: &str, token: &str) -> String {
    match config.email_link_base_url.as_deref() {
        Some(base_url) => format!("{}{}?token={}", base_url.trim_end_matches('/'), path, token),
        None => format!("{}?token={}", path, token),
    }
}
