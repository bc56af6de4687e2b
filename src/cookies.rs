use crate::config::{AppConfig, CookieSameSite};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Create the session cookie carrying the JWT
pub fn session_cookie_create(token: String, config: &AppConfig) -> Cookie<'static> {
    let max_age = Duration::seconds(config.access_token_expiry.as_secs() as i64);
    cookie_create(config.cookie_name.clone(), token, max_age, config)
}

/// Create a cookie that clears the session
pub fn session_cookie_clear(config: &AppConfig) -> Cookie<'static> {
    cookie_create(
        config.cookie_name.clone(),
        String::new(),
        Duration::ZERO,
        config,
    )
}

/// Create a cookie with standard security settings
fn cookie_create(
    name: String,
    value: String,
    max_age: Duration,
    config: &AppConfig,
) -> Cookie<'static> {
    let same_site = match config.cookie_same_site {
        CookieSameSite::None => SameSite::None,
        CookieSameSite::Lax => SameSite::Lax,
        CookieSameSite::Strict => SameSite::Strict,
    };

    let mut cookie = Cookie::build((name, value))
        .path(config.cookie_path.clone())
        .http_only(true)
        .same_site(same_site)
        .secure(config.cookie_secure)
        .max_age(max_age);

    if let Some(domain) = &config.cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookie.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_with_configured_lifetime() {
        let config = AppConfig::default();
        let cookie = session_cookie_create("jwt".to_string(), &config);

        assert_eq!(cookie.name(), "lifex_session");
        assert_eq!(cookie.value(), "jwt");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(Duration::seconds(config.access_token_expiry.as_secs() as i64))
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let config = AppConfig {
            cookie_domain: Some("lifex.app".to_string()),
            ..Default::default()
        };
        let cookie = session_cookie_clear(&config);

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.domain(), Some("lifex.app"));
    }
}
