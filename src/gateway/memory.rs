//! In-process [`Backend`] used by tests and local development.
//!
//! Every operation takes one lock over the whole store, so the
//! check-and-set in [`Backend::token_consume`] has the same exactly-once
//! semantics as the database's conditional update.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    backend::{
        Backend, ConfirmationToken, ConsumeOutcome, LocationPreferences,
        LocationPreferencesUpdate, NewUser, ProfileUpdate, UserAccount,
    },
    verification::TokenKind,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryBackendError {
    /// Simulated transient store failure.
    #[error("store unavailable")]
    Unavailable,

    #[error("user {0} not found")]
    UserNotFound(Uuid),
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, UserAccount>,
    tokens: HashMap<String, ConfirmationToken>,
    locations: HashMap<Uuid, LocationPreferences>,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
    token_writes_fail: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent token inserts fail with [`MemoryBackendError::Unavailable`].
    pub fn token_writes_fail(&self, fail: bool) {
        self.token_writes_fail.store(fail, Ordering::SeqCst);
    }

    /// Look up a token row by hash.
    pub fn token_get(&self, token_hash: &str) -> Option<ConfirmationToken> {
        self.store.lock().tokens.get(token_hash).cloned()
    }

    /// All token rows belonging to a user.
    pub fn tokens_for_user(&self, user_id: Uuid) -> Vec<ConfirmationToken> {
        self.store
            .lock()
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Move a token's expiry into the past.
    pub fn token_expire(&self, token_hash: &str) {
        if let Some(token) = self.store.lock().tokens.get_mut(token_hash) {
            token.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Shift every timestamp of a token back by `by`.
    pub fn token_backdate(&self, token_hash: &str, by: Duration) {
        if let Some(token) = self.store.lock().tokens.get_mut(token_hash) {
            token.created_at -= by;
            token.expires_at -= by;
            if let Some(consumed_at) = token.consumed_at.as_mut() {
                *consumed_at -= by;
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.store.lock().tokens.len()
    }
}

impl Backend for MemoryBackend {
    type Error = MemoryBackendError;

    async fn user_find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Self::Error> {
        Ok(self
            .store
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn user_get_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, Self::Error> {
        Ok(self.store.lock().users.get(&id).cloned())
    }

    async fn user_create(&self, user: &NewUser) -> Result<Option<UserAccount>, Self::Error> {
        let mut store = self.store.lock();
        if store.users.values().any(|u| u.email == user.email) {
            return Ok(None);
        }

        let account = UserAccount {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            email_verified: false,
            email_verified_at: None,
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: Utc::now(),
            last_sign_in_at: None,
        };
        store.users.insert(account.id, account.clone());
        Ok(Some(account))
    }

    async fn user_last_sign_in_update(&self, id: Uuid) -> Result<(), Self::Error> {
        let mut store = self.store.lock();
        let user = store
            .users
            .get_mut(&id)
            .ok_or(MemoryBackendError::UserNotFound(id))?;
        user.last_sign_in_at = Some(Utc::now());
        Ok(())
    }

    async fn user_mark_verified(&self, id: Uuid) -> Result<bool, Self::Error> {
        let mut store = self.store.lock();
        Ok(match store.users.get_mut(&id) {
            Some(user) => {
                user.email_verified = true;
                user.email_verified_at = Some(Utc::now());
                true
            }
            None => false,
        })
    }

    async fn user_password_update(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, Self::Error> {
        let mut store = self.store.lock();
        Ok(match store.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn user_profile_update(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<UserAccount>, Self::Error> {
        let mut store = self.store.lock();
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(username) = &update.username {
            user.username = username.clone();
        }
        if let Some(full_name) = &update.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        Ok(Some(user.clone()))
    }

    async fn token_insert(&self, token: &ConfirmationToken) -> Result<(), Self::Error> {
        if self.token_writes_fail.load(Ordering::SeqCst) {
            return Err(MemoryBackendError::Unavailable);
        }
        self.store
            .lock()
            .tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn token_consume(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, Self::Error> {
        let mut store = self.store.lock();
        let Some(token) = store
            .tokens
            .get_mut(token_hash)
            .filter(|t| t.kind == kind)
        else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if token.consumed_at.is_some() {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        if now >= token.expires_at {
            return Ok(ConsumeOutcome::Expired);
        }

        token.consumed_at = Some(now);
        Ok(ConsumeOutcome::Consumed {
            user_id: token.user_id,
        })
    }

    async fn token_purge(&self, cutoff: DateTime<Utc>) -> Result<u64, Self::Error> {
        let mut store = self.store.lock();
        let before = store.tokens.len();
        store.tokens.retain(|_, t| {
            t.expires_at >= cutoff && t.consumed_at.is_none_or(|at| at >= cutoff)
        });
        Ok((before - store.tokens.len()) as u64)
    }

    async fn location_preferences_get(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LocationPreferences>, Self::Error> {
        Ok(self.store.lock().locations.get(&user_id).cloned())
    }

    async fn location_preferences_set(
        &self,
        user_id: Uuid,
        update: &LocationPreferencesUpdate,
    ) -> Result<LocationPreferences, Self::Error> {
        let mut store = self.store.lock();
        if !store.users.contains_key(&user_id) {
            return Err(MemoryBackendError::UserNotFound(user_id));
        }

        let preferences = LocationPreferences {
            user_id,
            city: update.city.clone(),
            region: update.region.clone(),
            country: update.country.clone(),
            latitude: update.latitude,
            longitude: update.longitude,
            radius_km: update.radius_km,
            categories: update.categories.clone(),
            updated_at: Utc::now(),
        };
        store.locations.insert(user_id, preferences.clone());
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: "tester".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn token(user_id: Uuid, hash: &str, kind: TokenKind, ttl: Duration) -> ConfirmationToken {
        let now = Utc::now();
        ConfirmationToken {
            token_hash: hash.to_string(),
            user_id,
            kind,
            created_at: now,
            expires_at: now + ttl,
            consumed_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let backend = MemoryBackend::new();
        assert!(backend.user_create(&new_user("a@b.co")).await.unwrap().is_some());
        assert!(backend.user_create(&new_user("a@b.co")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_reports_each_failure_reason() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        backend
            .token_insert(&token(user_id, "live", TokenKind::EmailVerification, Duration::hours(1)))
            .await
            .unwrap();
        backend
            .token_insert(&token(
                user_id,
                "old",
                TokenKind::EmailVerification,
                Duration::seconds(-1),
            ))
            .await
            .unwrap();

        assert_eq!(
            backend.token_consume("missing", TokenKind::EmailVerification, now).await,
            Ok(ConsumeOutcome::NotFound)
        );
        assert_eq!(
            backend.token_consume("live", TokenKind::PasswordReset, now).await,
            Ok(ConsumeOutcome::NotFound)
        );
        assert_eq!(
            backend.token_consume("old", TokenKind::EmailVerification, now).await,
            Ok(ConsumeOutcome::Expired)
        );
        assert_eq!(
            backend.token_consume("live", TokenKind::EmailVerification, now).await,
            Ok(ConsumeOutcome::Consumed { user_id })
        );
        assert_eq!(
            backend.token_consume("live", TokenKind::EmailVerification, now).await,
            Ok(ConsumeOutcome::AlreadyConsumed)
        );
    }

    #[tokio::test]
    async fn purge_removes_only_stale_rows() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        for (hash, ttl) in [("fresh", Duration::hours(24)), ("stale", Duration::days(-10))] {
            backend
                .token_insert(&token(user_id, hash, TokenKind::EmailVerification, ttl))
                .await
                .unwrap();
        }
        backend
            .token_insert(&token(user_id, "used", TokenKind::PasswordReset, Duration::hours(1)))
            .await
            .unwrap();
        backend
            .token_consume("used", TokenKind::PasswordReset, now - Duration::days(8))
            .await
            .unwrap();

        let removed = backend.token_purge(now - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 2);
        assert!(backend.token_get("fresh").is_some());
        assert!(backend.token_get("stale").is_none());
        assert!(backend.token_get("used").is_none());
    }

    #[tokio::test]
    async fn failing_token_writes_surface_as_unavailable() {
        let backend = MemoryBackend::new();
        backend.token_writes_fail(true);
        let result = backend
            .token_insert(&token(
                Uuid::new_v4(),
                "x",
                TokenKind::EmailVerification,
                Duration::hours(1),
            ))
            .await;
        assert_eq!(result, Err(MemoryBackendError::Unavailable));
        assert_eq!(backend.token_count(), 0);
    }
}
