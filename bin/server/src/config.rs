//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables
//! (`DATABASE_URL`, `SESSION__SECRET`, `GOOGLE__CLIENT_ID`, ...).
//!
//! See [`GoogleConfig`](tkj_learning_platform_access::GoogleConfig) for the
//! sign-in provider settings.

use serde::Deserialize;
use tkj_learning_platform_access::{
    DEFAULT_MAX_AGE_DAYS, GoogleConfig, MAX_AGE_DAYS_RANGE, RoleRefresh,
};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Session configuration.
    pub session: SessionConfig,

    /// Google sign-in configuration.
    pub google: GoogleConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Session-related configuration.
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign session tokens.
    pub secret: String,

    /// Maximum session lifetime in days, counted from the last request.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// When the stored role is read back into the session token.
    #[serde(default)]
    pub role_refresh: RoleRefresh,
}

fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

fn default_secure_cookies() -> bool {
    true
}

impl SessionConfig {
    /// Creates a session configuration with defaults for optional fields.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            max_age_days: default_max_age_days(),
            secure_cookies: default_secure_cookies(),
            role_refresh: RoleRefresh::default(),
        }
    }

    /// Returns the maximum session lifetime, clamped to [`MAX_AGE_DAYS_RANGE`].
    #[must_use]
    pub fn max_age(&self) -> chrono::Duration {
        let days = self
            .max_age_days
            .clamp(*MAX_AGE_DAYS_RANGE.start(), *MAX_AGE_DAYS_RANGE.end());
        chrono::Duration::days(days)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if !MAX_AGE_DAYS_RANGE.contains(&self.max_age_days) {
            return Err(config::ConfigError::Message(format!(
                "session.max_age_days must be within {}..={}, got {}",
                MAX_AGE_DAYS_RANGE.start(),
                MAX_AGE_DAYS_RANGE.end(),
                self.max_age_days
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_age_days", &self.max_age_days)
            .field("secure_cookies", &self.secure_cookies)
            .field("role_refresh", &self.role_refresh)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.session.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        config::Environment::default().source(Some(source))
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::new("secret".to_string());
        assert_eq!(config.max_age_days, 30);
        assert_eq!(config.max_age(), chrono::Duration::days(30));
        assert!(config.secure_cookies);
        assert_eq!(config.role_refresh, RoleRefresh::Always);
    }

    #[test]
    fn loads_nested_settings_from_environment() {
        let config = ServerConfig::from_source(environment(&[
            ("DATABASE_URL", "postgres://localhost/tkj"),
            ("SESSION__SECRET", "a-very-long-session-signing-secret"),
            ("SESSION__MAX_AGE_DAYS", "7"),
            ("SESSION__ROLE_REFRESH", "when_missing"),
            ("GOOGLE__CLIENT_ID", "client.apps.googleusercontent.com"),
            ("GOOGLE__CLIENT_SECRET", "shh"),
            ("GOOGLE__REDIRECT_URI", "http://localhost:3000/auth/callback"),
        ]))
        .expect("load config");

        assert_eq!(config.database_url, "postgres://localhost/tkj");
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.session.max_age_days, 7);
        assert_eq!(config.session.role_refresh, RoleRefresh::WhenMissing);
        assert_eq!(config.google.client_id(), "client.apps.googleusercontent.com");
        assert!(config.google.allow_email_account_linking());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let result = ServerConfig::from_source(environment(&[
            ("DATABASE_URL", "postgres://localhost/tkj"),
            ("GOOGLE__CLIENT_ID", "id"),
            ("GOOGLE__CLIENT_SECRET", "secret"),
            ("GOOGLE__REDIRECT_URI", "http://localhost:3000/auth/callback"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_max_age_is_rejected() {
        for days in ["0", "-5", "3651", "200000000000"] {
            let result = ServerConfig::from_source(environment(&[
                ("DATABASE_URL", "postgres://localhost/tkj"),
                ("SESSION__SECRET", "a-very-long-session-signing-secret"),
                ("SESSION__MAX_AGE_DAYS", days),
                ("GOOGLE__CLIENT_ID", "id"),
                ("GOOGLE__CLIENT_SECRET", "secret"),
                ("GOOGLE__REDIRECT_URI", "http://localhost:3000/auth/callback"),
            ]));
            let err = result.expect_err("max age should be rejected");
            assert!(err.to_string().contains("max_age_days"), "{days}: {err}");
        }
    }

    #[test]
    fn max_age_never_panics_on_huge_values() {
        let mut config = SessionConfig::new("secret".to_string());
        config.max_age_days = 200_000_000_000;
        assert_eq!(config.max_age(), chrono::Duration::days(3650));
        config.max_age_days = 0;
        assert_eq!(config.max_age(), chrono::Duration::days(1));
    }

    #[test]
    fn debug_hides_secret() {
        let text = format!("{:?}", SessionConfig::new("do-not-print".to_string()));
        assert!(!text.contains("do-not-print"));
    }
}
