use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors when loading or validating service configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("missing env var {0}")]
    MissingEnv(&'static str),

    /// Configuration failed validation checks.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Cookie SameSite policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    /// Cookies are sent in all contexts
    None,
    /// Cookies are sent in same-site and cross-site top-level navigations
    Lax,
    /// Cookies are only sent in same-site contexts
    Strict,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address the server binds to (default: "0.0.0.0:3000")
    pub bind_addr: String,

    // --- Session Settings ---
    /// Secret key for signing session JWTs
    pub jwt_secret: String,

    /// Session token expiry duration (default: 7 days)
    pub access_token_expiry: Duration,

    /// JWT issuer claim (default: "lifex")
    pub jwt_issuer: String,

    /// JWT audience claim (default: "authenticated")
    pub jwt_audience: String,

    /// Minimum password length (default: 6)
    pub password_min_length: usize,

    /// Maximum password length (default: 128)
    pub password_max_length: usize,

    /// Whether passwords must contain at least one letter (default: false)
    pub password_require_letter: bool,

    /// Whether passwords must contain at least one number (default: false)
    pub password_require_number: bool,

    /// Session cookie name (default: "lifex_session")
    pub cookie_name: String,

    /// Cookie domain (optional, default: None)
    pub cookie_domain: Option<String>,

    /// Cookie path (default: "/")
    pub cookie_path: String,

    /// Cookie secure flag - only send over HTTPS (default: true in production, false in debug)
    pub cookie_secure: bool,

    /// Cookie SameSite policy (default: Lax)
    pub cookie_same_site: CookieSameSite,

    // --- Verification Settings ---
    /// Email verification token expiry (default: 24 hours)
    pub email_verification_token_expiry: Duration,

    /// Password reset token expiry (default: 1 hour)
    pub password_reset_token_expiry: Duration,

    /// App origin used in email links (e.g., "https://lifex.app").
    pub email_link_base_url: Option<String>,

    /// Whether to require email confirmation before login (default: false)
    pub email_confirmation_require: bool,

    /// How long consumed or expired tokens are kept before the sweeper deletes them
    /// (default: 7 days)
    pub token_retention: Duration,

    /// Sweeper tick interval; zero disables the sweeper (default: 1 hour)
    pub token_sweep_interval: Duration,

    // --- Gateways ---
    /// Hosted database base URL (`SUPABASE_URL`)
    pub database_url: Option<String>,

    /// Privileged service credential for server-side queries
    pub database_service_key: Option<String>,

    /// Restricted credential handed to client-side callers
    pub database_anon_key: Option<String>,

    /// Transactional email API key
    pub email_api_key: Option<String>,

    /// Transactional email API base URL (default: "https://api.resend.com")
    pub email_api_base_url: String,

    /// Sender address, e.g. `LifeX <hello@lifex.app>`
    pub email_from: Option<String>,

    // --- Optional integrations (reported by diagnostics only) ---
    pub openai_api_key: Option<String>,
    pub google_places_api_key: Option<String>,
    pub analytics_write_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: String::new(), // Must be provided by user
            access_token_expiry: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            jwt_issuer: "lifex".to_string(),
            jwt_audience: "authenticated".to_string(),
            password_min_length: 6,
            password_max_length: 128,
            password_require_letter: false,
            password_require_number: false,
            cookie_name: "lifex_session".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_secure: !cfg!(debug_assertions), // true in release, false in debug
            cookie_same_site: CookieSameSite::Lax,
            email_verification_token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
            password_reset_token_expiry: Duration::from_secs(60 * 60),          // 1 hour
            email_link_base_url: None,
            email_confirmation_require: false,
            token_retention: Duration::from_secs(7 * 24 * 60 * 60),
            token_sweep_interval: Duration::from_secs(60 * 60),
            database_url: None,
            database_service_key: None,
            database_anon_key: None,
            email_api_key: None,
            email_api_base_url: "https://api.resend.com".to_string(),
            email_from: None,
            openai_api_key: None,
            google_places_api_key: None,
            analytics_write_key: None,
        }
    }
}

/// Presence of one recognised environment variable.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarStatus {
    /// Variable name.
    pub name: &'static str,
    /// Whether the service cannot fully work without it.
    pub required: bool,
    /// Whether a non-empty value was provided.
    pub present: bool,
}

impl AppConfig {
    /// Build config from environment variables.
    ///
    /// Required:
    /// - `AUTH_JWT_SECRET`
    ///
    /// Gateway credentials are optional here. Their absence is reported by
    /// [`AppConfig::env_report`] instead of failing startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.jwt_secret = env_var_required("AUTH_JWT_SECRET")?;
        cfg.access_token_expiry = Duration::from_secs(env_var_parse_or_default(
            "AUTH_ACCESS_TOKEN_EXPIRY_SECS",
            cfg.access_token_expiry.as_secs(),
            "u64",
        )?);
        cfg.password_min_length =
            env_var_parse_or_default("AUTH_PASSWORD_MIN_LENGTH", cfg.password_min_length, "usize")?;
        cfg.password_max_length =
            env_var_parse_or_default("AUTH_PASSWORD_MAX_LENGTH", cfg.password_max_length, "usize")?;
        cfg.password_require_letter =
            env_var_bool_or_default("AUTH_PASSWORD_REQUIRE_LETTER", cfg.password_require_letter)?;
        cfg.password_require_number =
            env_var_bool_or_default("AUTH_PASSWORD_REQUIRE_NUMBER", cfg.password_require_number)?;
        cfg.cookie_secure = env_var_bool_or_default("AUTH_COOKIE_SECURE", cfg.cookie_secure)?;
        cfg.cookie_same_site =
            env_var_cookie_same_site_or_default("AUTH_COOKIE_SAME_SITE", cfg.cookie_same_site)?;
        cfg.email_verification_token_expiry = Duration::from_secs(env_var_parse_or_default(
            "AUTH_EMAIL_VERIFICATION_TOKEN_EXPIRY_SECS",
            cfg.email_verification_token_expiry.as_secs(),
            "u64",
        )?);
        cfg.password_reset_token_expiry = Duration::from_secs(env_var_parse_or_default(
            "AUTH_PASSWORD_RESET_TOKEN_EXPIRY_SECS",
            cfg.password_reset_token_expiry.as_secs(),
            "u64",
        )?);
        cfg.email_confirmation_require = env_var_bool_or_default(
            "AUTH_EMAIL_CONFIRMATION_REQUIRE",
            cfg.email_confirmation_require,
        )?;
        cfg.token_retention = Duration::from_secs(env_var_parse_or_default(
            "TOKEN_RETENTION_SECS",
            cfg.token_retention.as_secs(),
            "u64",
        )?);
        cfg.token_sweep_interval = Duration::from_secs(env_var_parse_or_default(
            "TOKEN_SWEEP_INTERVAL_SECS",
            cfg.token_sweep_interval.as_secs(),
            "u64",
        )?);

        if let Some(v) = env_var_optional("LIFEX_BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Some(v) = env_var_optional("AUTH_JWT_ISSUER") {
            cfg.jwt_issuer = v;
        }
        if let Some(v) = env_var_optional("AUTH_JWT_AUDIENCE") {
            cfg.jwt_audience = v;
        }
        if let Some(v) = env_var_optional("AUTH_COOKIE_NAME") {
            cfg.cookie_name = v;
        }
        if let Some(v) = env_var_optional("AUTH_COOKIE_PATH") {
            cfg.cookie_path = v;
        }
        if let Some(v) = env_var_optional("RESEND_API_BASE_URL") {
            cfg.email_api_base_url = v;
        }
        cfg.cookie_domain = env_var_optional("AUTH_COOKIE_DOMAIN");
        cfg.email_link_base_url = env_var_optional("APP_URL");
        cfg.database_url = env_var_optional("SUPABASE_URL");
        cfg.database_service_key = env_var_optional("SUPABASE_SERVICE_ROLE_KEY");
        cfg.database_anon_key = env_var_optional("SUPABASE_ANON_KEY");
        cfg.email_api_key = env_var_optional("RESEND_API_KEY");
        cfg.email_from = env_var_optional("EMAIL_FROM");
        cfg.openai_api_key = env_var_optional("OPENAI_API_KEY");
        cfg.google_places_api_key = env_var_optional("GOOGLE_PLACES_API_KEY");
        cfg.analytics_write_key = env_var_optional("ANALYTICS_WRITE_KEY");

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "JWT secret cannot be empty".to_string(),
            ));
        }

        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_expiry.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "Access token expiry must be greater than 0".to_string(),
            ));
        }

        if self.email_verification_token_expiry.as_secs() == 0
            || self.password_reset_token_expiry.as_secs() == 0
        {
            return Err(ConfigError::Invalid(
                "Verification token expiry must be greater than 0".to_string(),
            ));
        }

        if self.password_min_length == 0 {
            return Err(ConfigError::Invalid(
                "Minimum password length must be greater than 0".to_string(),
            ));
        }

        if self.password_max_length < self.password_min_length {
            return Err(ConfigError::Invalid(
                "Maximum password length must be greater than or equal to minimum password length"
                    .to_string(),
            ));
        }

        if self.email_confirmation_require
            && self
                .email_link_base_url
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .is_none()
        {
            return Err(ConfigError::Invalid(
                "APP_URL must be set when AUTH_EMAIL_CONFIRMATION_REQUIRE=true".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether both the email API key and the sender address are set.
    pub fn email_configured(&self) -> bool {
        self.email_api_key.is_some() && self.email_from.is_some()
    }

    /// Presence report for every recognised environment variable. Never includes values.
    pub fn env_report(&self) -> Vec<EnvVarStatus> {
        let entry = |name, required, present| EnvVarStatus {
            name,
            required,
            present,
        };

        vec![
            entry("AUTH_JWT_SECRET", true, !self.jwt_secret.is_empty()),
            entry("SUPABASE_URL", true, self.database_url.is_some()),
            entry(
                "SUPABASE_SERVICE_ROLE_KEY",
                true,
                self.database_service_key.is_some(),
            ),
            entry("SUPABASE_ANON_KEY", false, self.database_anon_key.is_some()),
            entry("RESEND_API_KEY", true, self.email_api_key.is_some()),
            entry("EMAIL_FROM", true, self.email_from.is_some()),
            entry("APP_URL", true, self.email_link_base_url.is_some()),
            entry("OPENAI_API_KEY", false, self.openai_api_key.is_some()),
            entry(
                "GOOGLE_PLACES_API_KEY",
                false,
                self.google_places_api_key.is_some(),
            ),
            entry(
                "ANALYTICS_WRITE_KEY",
                false,
                self.analytics_write_key.is_some(),
            ),
        ]
    }
}

fn env_var_required(key: &'static str) -> Result<String, ConfigError> {
    env_var_optional(key).ok_or(ConfigError::MissingEnv(key))
}

fn env_var_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_var_parse_or_default<T: std::str::FromStr>(
    key: &str,
    default: T,
    type_name: &str,
) -> Result<T, ConfigError> {
    match env_var_optional(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a valid {type_name}"))),
        _ => Ok(default),
    }
}

fn env_var_bool_or_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_var_optional(key) {
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(format!(
                "{key} must be a valid boolean"
            ))),
        },
        _ => Ok(default),
    }
}

fn env_var_cookie_same_site_or_default(
    key: &str,
    default: CookieSameSite,
) -> Result<CookieSameSite, ConfigError> {
    match env_var_optional(key) {
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "none" => Ok(CookieSameSite::None),
            "lax" => Ok(CookieSameSite::Lax),
            "strict" => Ok(CookieSameSite::Strict),
            _ => Err(ConfigError::Invalid(format!(
                "{key} must be one of: none, lax, strict"
            ))),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: &[&str] = &[
        "AUTH_JWT_SECRET",
        "AUTH_EMAIL_VERIFICATION_TOKEN_EXPIRY_SECS",
        "AUTH_COOKIE_SAME_SITE",
        "SUPABASE_URL",
        "RESEND_API_KEY",
        "EMAIL_FROM",
        "APP_URL",
    ];

    fn env_clear() {
        for key in ENV_KEYS {
            // SAFETY: env-mutating tests are serialized with `#[serial]`.
            unsafe { std::env::remove_var(key) };
        }
    }

    fn env_set(key: &str, value: &str) {
        // SAFETY: env-mutating tests are serialized with `#[serial]`.
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn defaults_match_registration_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.password_min_length, 6);
        assert_eq!(
            cfg.email_verification_token_expiry,
            Duration::from_secs(24 * 60 * 60)
        );
        assert!(!cfg.password_require_letter);
        assert!(!cfg.password_require_number);
    }

    #[test]
    fn validate_fails_short_secret() {
        let cfg = AppConfig {
            jwt_secret: "short".to_string(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_requires_app_url_when_confirmation_required() {
        let cfg = AppConfig {
            jwt_secret: "a".repeat(32),
            email_confirmation_require: true,
            email_link_base_url: None,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn from_env_requires_jwt_secret() {
        env_clear();
        assert_eq!(
            AppConfig::from_env().unwrap_err(),
            ConfigError::MissingEnv("AUTH_JWT_SECRET")
        );
    }

    #[test]
    #[serial]
    fn from_env_tolerates_missing_gateway_credentials() {
        env_clear();
        env_set("AUTH_JWT_SECRET", &"s".repeat(40));

        let cfg = AppConfig::from_env().expect("config loads without gateways");
        assert!(cfg.database_url.is_none());
        assert!(!cfg.email_configured());

        let missing: Vec<_> = cfg
            .env_report()
            .into_iter()
            .filter(|v| v.required && !v.present)
            .map(|v| v.name)
            .collect();
        assert!(missing.contains(&"SUPABASE_URL"));
        assert!(missing.contains(&"RESEND_API_KEY"));
        assert!(!missing.contains(&"AUTH_JWT_SECRET"));
        env_clear();
    }

    #[test]
    #[serial]
    fn from_env_parses_overrides() {
        env_clear();
        env_set("AUTH_JWT_SECRET", &"s".repeat(40));
        env_set("AUTH_EMAIL_VERIFICATION_TOKEN_EXPIRY_SECS", "120");
        env_set("AUTH_COOKIE_SAME_SITE", "Strict");
        env_set("APP_URL", "https://lifex.app");

        let cfg = AppConfig::from_env().expect("config");
        assert_eq!(cfg.email_verification_token_expiry, Duration::from_secs(120));
        assert_eq!(cfg.cookie_same_site, CookieSameSite::Strict);
        assert_eq!(cfg.email_link_base_url.as_deref(), Some("https://lifex.app"));
        env_clear();
    }

    #[test]
    #[serial]
    fn from_env_rejects_bad_numbers() {
        env_clear();
        env_set("AUTH_JWT_SECRET", &"s".repeat(40));
        env_set("AUTH_EMAIL_VERIFICATION_TOKEN_EXPIRY_SECS", "soon");

        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::Invalid(_))
        ));
        env_clear();
    }
}
