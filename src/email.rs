//! Address parsing for account lookups.
//!
//! Every address that reaches the user table goes through [`email_normalize`],
//! so registration, login, resend and password reset all look accounts up by
//! the same folded form.

use crate::error::AppError;
use email_address::EmailAddress;
use std::str::FromStr;

/// Longest address accepted (the SMTP forward-path limit).
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Trim, check and lowercase an address.
///
/// A blank value is a missing field ([`AppError::Validation`]). Anything the
/// parser rejects or that exceeds [`EMAIL_MAX_LENGTH`] is
/// [`AppError::InvalidEmail`].
pub fn email_normalize(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if email.len() > EMAIL_MAX_LENGTH {
        return Err(AppError::InvalidEmail);
    }

    let address = EmailAddress::from_str(email).map_err(|_| AppError::InvalidEmail)?;

    // Local part is folded too: "Maria@" and "maria@" are one account.
    Ok(address.as_str().to_lowercase())
}
