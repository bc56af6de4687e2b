//! # lifex
//!
//! Account service for LifeX: registration, email confirmation, sessions,
//! profiles and location preferences, served as JSON over axum.
//!
//! ## Features
//!
//! - **Single-use confirmation tokens** hashed at rest, redeemed with one
//!   conditional write so concurrent clicks cannot both succeed
//! - **JWT session cookie** (httpOnly) validated by a middleware
//! - **Pluggable storage** through the [`Backend`] trait (PostgREST or in-memory)
//! - **Pluggable email gateway** through the [`EmailSender`] trait
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lifex::{App, AppConfig, ResendSender, gateway::PostgrestBackend};
//!
//! let config = AppConfig::from_env()?;
//! let client = reqwest::Client::new();
//! let backend = PostgrestBackend::from_config(client.clone(), &config);
//! let sender = ResendSender::from_config(client, &config);
//!
//! let app = App::new(config, backend)?.with_email_sender(sender);
//! let router = app.router();
//! ```
//!
//! ## Endpoints
//!
//! - `POST /api/auth/register` - Create an unverified account and send the confirmation email
//! - `POST /api/auth/login` - Authenticate and set the session cookie
//! - `POST /api/auth/logout` - Clear the session cookie
//! - `GET /api/auth/me` - Current user (requires session)
//! - `POST /api/auth/profile` - Update profile fields (requires session)
//! - `GET /auth/confirm?token=` / `POST /api/auth/confirm` - Redeem a confirmation token
//! - `POST /api/auth/resend-confirmation` - Issue a new confirmation email
//! - `POST /api/auth/password/forgot` / `POST /api/auth/password/reset`
//! - `GET|POST /api/user/location-preferences` (requires session)
//! - `GET /api/diagnostics/env`, `GET /api/diagnostics/email`, `GET /api/health`

mod backend;
mod config;
pub mod confirmation;
mod cookies;
mod email;
mod email_sender;
mod error;
mod extractors;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod openapi;
mod password;
pub mod sweeper;
pub mod telemetry;
mod templates;
pub mod testing;
pub mod tokens;
pub mod verification;

use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub use backend::{
    Backend, ConfirmationToken, ConsumeOutcome, LocationPreferences, LocationPreferencesUpdate,
    NewUser, ProfileUpdate, UserAccount,
};
pub use config::{AppConfig, ConfigError, CookieSameSite, EnvVarStatus};
pub use confirmation::{ConfirmationDelivery, ConfirmationError, ConfirmationService, IssuedToken};
pub use email_sender::{EmailMessage, EmailReceipt, EmailSendError, EmailSender, ResendSender};
pub use error::{AppError, ErrorResponse};
pub use extractors::CurrentUser;
pub use verification::TokenKind;

/// Public view of an account. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<&UserAccount> for UserResponse {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            email_verified: user.email_verified,
            email_verified_at: user.email_verified_at,
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at,
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

/// Shared application state. Cheap to clone.
///
/// # Type Parameters
///
/// - `B`: storage implementing [`Backend`]
/// - `E`: email gateway implementing [`EmailSender`] (defaults to the no-op `()`)
#[derive(Clone)]
pub struct App<B: Backend, E: EmailSender = ()> {
    config: Arc<AppConfig>,
    backend: B,
    email_sender: E,
}

impl<B: Backend> App<B, ()> {
    /// Create an app with the no-op email sender.
    pub fn new(config: AppConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            backend,
            email_sender: (),
        })
    }
}

impl<B: Backend, E: EmailSender> App<B, E> {
    /// Attach an email gateway.
    pub fn with_email_sender<NewE: EmailSender>(self, email_sender: NewE) -> App<B, NewE> {
        App {
            config: self.config,
            backend: self.backend,
            email_sender,
        }
    }

    /// All endpoints with the session middleware applied, for merging into a larger router.
    pub fn routes<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new()
            .merge(handlers::register_routes::<B, E>())
            .merge(handlers::login_routes::<B, E>())
            .merge(handlers::logout_routes::<B, E>())
            .merge(handlers::me_routes::<B, E>())
            .merge(handlers::profile_routes::<B, E>())
            .merge(handlers::confirm_routes::<B, E>())
            .merge(handlers::resend_routes::<B, E>())
            .merge(handlers::password_routes::<B, E>())
            .merge(handlers::location_routes::<B, E>())
            .merge(handlers::diagnostics_routes::<B, E>())
            .merge(handlers::health_routes::<B, E>())
            .layer(axum::middleware::from_fn_with_state(
                self.clone(),
                middleware::session::<B, E>,
            ))
            .with_state(self.clone())
    }

    /// Standalone router.
    pub fn router(&self) -> Router {
        self.routes::<()>()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn email_sender(&self) -> &E {
        &self.email_sender
    }

    /// Token service bound to this app's config, backend and sender.
    pub fn confirmation(&self) -> ConfirmationService<'_, B, E> {
        ConfirmationService::new(&self.config, &self.backend, &self.email_sender)
    }
}
