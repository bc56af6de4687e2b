//! Token generation and validation utilities.

use crate::{config::AppConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Session JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// User email.
    pub email: String,
}

/// Generate a session token (JWT).
pub fn session_token_generate(
    user_id: Uuid,
    email: String,
    config: &AppConfig,
) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = Duration::from_std(config.access_token_expiry)
        .ok()
        .and_then(|expiry| now.checked_add_signed(expiry))
        .ok_or_else(|| AppError::Internal("session expiry overflow".to_string()))?;

    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        email,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate and decode a session token.
pub fn session_token_validate(token: &str, config: &AppConfig) -> Result<SessionClaims, AppError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Generate an opaque random token (32 bytes, hex encoded).
pub fn token_generate() -> String {
    let mut rng = rand::rng();
    let token: [u8; 32] = rng.random();
    hex::encode(token)
}

/// Hash a token for storage (SHA-256, hex encoded).
pub fn token_hash_sha256(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a token together with its storage hash.
pub fn token_with_hash_generate() -> (String, String) {
    let token = token_generate();
    let hash = token_hash_sha256(&token);
    (token, hash)
}

/// Expiry timestamp for a token issued now.
pub fn token_expiry_calculate(
    now: DateTime<Utc>,
    lifetime: std::time::Duration,
) -> Result<DateTime<Utc>, AppError> {
    Duration::from_std(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AppError::Internal("token expiry overflow".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            jwt_secret: "test_secret_key_at_least_32_chars_long_for_security".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_and_validate_session_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let email = "test@example.com".to_string();

        let token = session_token_generate(user_id, email.clone(), &config).unwrap();
        let claims = session_token_validate(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, email);
        assert_eq!(claims.iss, config.jwt_issuer);
        assert_eq!(claims.aud, config.jwt_audience);
    }

    #[test]
    fn test_invalid_token_fails() {
        let config = test_config();
        assert!(session_token_validate("invalid_token", &config).is_err());
    }

    #[test]
    fn test_token_with_wrong_secret_fails() {
        let config = test_config();
        let token =
            session_token_generate(Uuid::new_v4(), "test@example.com".into(), &config).unwrap();

        let mut wrong_config = config;
        wrong_config.jwt_secret =
            "wrong_secret_key_at_least_32_chars_long_for_security".to_string();

        assert!(session_token_validate(&token, &wrong_config).is_err());
    }

    #[test]
    fn test_generate_token() {
        let token1 = token_generate();
        let token2 = token_generate();

        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 64);
        assert!(token1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_matches_generated_pair() {
        let (token, hash) = token_with_hash_generate();
        assert_eq!(token_hash_sha256(&token), hash);
        assert_eq!(hash.len(), 64);
        assert_ne!(token, hash);
    }

    #[test]
    fn test_expiry_is_offset_from_now() {
        let now = Utc::now();
        let expires_at =
            token_expiry_calculate(now, std::time::Duration::from_secs(24 * 60 * 60)).unwrap();
        assert_eq!(expires_at - now, Duration::hours(24));
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let lifetime = std::time::Duration::from_secs(9_000_000_000_000);
        let err = token_expiry_calculate(Utc::now(), lifetime).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_session_expiry_overflow_is_an_error() {
        let config = AppConfig {
            access_token_expiry: std::time::Duration::from_secs(9_000_000_000_000),
            ..test_config()
        };
        let err = session_token_generate(Uuid::new_v4(), "a@b.co".to_string(), &config)
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
