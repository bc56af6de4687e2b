//! Password policy and Argon2id hashing.

use crate::{config::AppConfig, error::AppError};
use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

/// Check `password` against the configured policy.
///
/// Length is counted in characters. The first failing rule is reported as
/// [`AppError::WeakPassword`].
pub fn password_validate(password: &str, config: &AppConfig) -> Result<(), AppError> {
    let length = password.chars().count();
    let (min, max) = (config.password_min_length, config.password_max_length);

    let failure = if length < min {
        Some(format!("Password must be at least {min} characters"))
    } else if length > max {
        Some(format!("Password must be at most {max} characters"))
    } else if config.password_require_letter && !password.chars().any(char::is_alphabetic) {
        Some("Password must contain a letter".to_string())
    } else if config.password_require_number && !password.chars().any(char::is_numeric) {
        Some("Password must contain a number".to_string())
    } else {
        None
    };

    match failure {
        Some(reason) => Err(AppError::WeakPassword(reason)),
        None => Ok(()),
    }
}

/// Hash with Argon2id and a fresh salt, in PHC string form.
pub fn password_hash(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Compare `password` with a stored PHC hash.
///
/// A mismatch is `Ok(false)`. Only an unreadable stored hash is an error.
pub fn password_verify(password: &str, stored: &str) -> Result<bool, AppError> {
    let stored = PasswordHash::new(stored).map_err(|e| AppError::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::PasswordHash(e.to_string())),
    }
}
