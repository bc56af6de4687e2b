//! Storage abstraction for accounts, confirmation tokens and location preferences.
//!
//! The service never touches a database directly. Every read and write goes
//! through [`Backend`], which is implemented by
//! [`PostgrestBackend`](crate::gateway::PostgrestBackend) for the hosted
//! database and by [`MemoryBackend`](crate::gateway::MemoryBackend) for tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::verification::TokenKind;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new account.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.avatar_url.is_none()
            && self.bio.is_none()
    }
}

/// A row of the `confirmation_tokens` table.
///
/// Only the SHA-256 of the opaque token is stored. The row is immutable apart
/// from the single write that sets `consumed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ConfirmationToken {
    /// A token is redeemable iff it was never consumed and has not expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && now < self.expires_at
    }
}

/// Result of a single conditional consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The token was active and is now consumed.
    Consumed { user_id: Uuid },
    /// No token with this hash and kind exists.
    NotFound,
    /// The token exists but `expires_at` has passed.
    Expired,
    /// The token was consumed earlier (possibly by a concurrent request).
    AlreadyConsumed,
}

/// Structured location preferences, one row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct LocationPreferences {
    pub user_id: Uuid,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by the `update_location_preferences` procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPreferencesUpdate {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: f64,
    pub categories: Vec<String>,
}

/// Backend storage trait.
///
/// Implementations own uniqueness and atomicity: [`Backend::user_create`] must
/// reject duplicate emails and [`Backend::token_consume`] must be a single
/// conditional write so that concurrent consumers of the same token observe
/// exactly one [`ConsumeOutcome::Consumed`].
pub trait Backend: Clone + Send + Sync + 'static {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Find a user by normalized email.
    fn user_find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send;

    /// Find a user by id.
    fn user_get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send;

    /// Create a user. Returns `None` if the email is already taken.
    fn user_create(
        &self,
        user: &NewUser,
    ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send;

    /// Update the last sign-in timestamp.
    fn user_last_sign_in_update(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Flip the verified flag. Returns `false` if the user does not exist.
    fn user_mark_verified(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Replace the password hash. Returns `false` if the user does not exist.
    fn user_password_update(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Apply a partial profile update and return the updated row.
    fn user_profile_update(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send;

    /// Persist a freshly issued token.
    fn token_insert(
        &self,
        token: &ConfirmationToken,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Atomically consume an active token of the given kind.
    fn token_consume(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<ConsumeOutcome, Self::Error>> + Send;

    /// Delete tokens that expired or were consumed before `cutoff`. Returns the number deleted.
    fn token_purge(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Fetch a user's location preferences.
    fn location_preferences_get(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<LocationPreferences>, Self::Error>> + Send;

    /// Upsert a user's location preferences.
    fn location_preferences_set(
        &self,
        user_id: Uuid,
        update: &LocationPreferencesUpdate,
    ) -> impl Future<Output = Result<LocationPreferences, Self::Error>> + Send;
}
