use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

/// Placeholder signing secret used when `JWT_SECRET` is not provided.
/// Refused at startup outside development.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-only-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub admin: AdminBootstrap,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a connection at startup and per acquire.
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expires_in_days: i64,
    pub cookie_expires_in_days: i64,
    /// Adds the `Secure` attribute to the session cookie.
    pub secure_cookies: bool,
}

/// Credentials for the administrator created on first start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub support_email: String,
    pub from_email: String,
    /// Base URL used when building links that are mailed to users.
    pub frontend_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-default value outside development")]
    InsecureJwtSecret,
    #[error("JWT_SECRET must be at least 32 characters, got {0}")]
    ShortJwtSecret(usize),
    #[error("DATABASE_URL must be set outside development")]
    MissingDatabaseUrl,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.port = v.parse().unwrap_or(self.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRES_IN_DAYS") {
            self.security.jwt_expires_in_days = v.parse().unwrap_or(self.security.jwt_expires_in_days);
        }
        if let Ok(v) = env::var("JWT_COOKIE_EXPIRES_IN_DAYS") {
            self.security.cookie_expires_in_days =
                v.parse().unwrap_or(self.security.cookie_expires_in_days);
        }

        // Admin bootstrap
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.admin.email = Some(v.trim().to_lowercase());
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            self.admin.password = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_NAME") {
            self.admin.name = v;
        }

        // Mail
        if let Ok(v) = env::var("SUPPORT_EMAIL") {
            self.mail.support_email = v;
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from_email = v;
        }
        if let Ok(v) = env::var("FRONTEND_URL") {
            self.mail.frontend_url = v.trim_end_matches('/').to_string();
        }

        self
    }

    /// Checks settings that must never reach a non-development deployment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Development {
            return Ok(());
        }
        if self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEVELOPMENT_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::ShortJwtSecret(self.security.jwt_secret.len()));
        }
        if self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024, // 10KB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expires_in_days: 30,
                cookie_expires_in_days: 30,
                secure_cookies: false,
            },
            admin: AdminBootstrap {
                email: None,
                password: None,
                name: "Administrator".to_string(),
            },
            mail: MailConfig {
                support_email: "support@localhost".to_string(),
                from_email: "no-reply@localhost".to_string(),
                frontend_url: "http://localhost:5173".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            port: 3000,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 500,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expires_in_days: 30,
                cookie_expires_in_days: 30,
                secure_cookies: true,
            },
            admin: AdminBootstrap {
                email: None,
                password: None,
                name: "Administrator".to_string(),
            },
            mail: MailConfig {
                support_email: "support@staging.example.com".to_string(),
                from_email: "no-reply@staging.example.com".to_string(),
                frontend_url: "https://staging.example.com".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            port: 3000,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expires_in_days: 30,
                cookie_expires_in_days: 30,
                secure_cookies: true,
            },
            admin: AdminBootstrap {
                email: None,
                password: None,
                name: "Administrator".to_string(),
            },
            mail: MailConfig {
                support_email: "support@example.com".to_string(),
                from_email: "no-reply@example.com".to_string(),
                frontend_url: "https://app.example.com".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macros for common checks
#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.api.enable_rate_limiting);
        assert_eq!(config.security.jwt_expires_in_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.api.enable_rate_limiting);
        assert!(config.security.secure_cookies);
    }

    #[test]
    fn production_rejects_missing_or_default_secret() {
        let mut config = AppConfig::production();
        assert!(matches!(config.validate(), Err(ConfigError::InsecureJwtSecret)));

        config.security.jwt_secret = DEVELOPMENT_JWT_SECRET.to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InsecureJwtSecret)));

        config.security.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ShortJwtSecret(5))));

        config.security.jwt_secret = "x".repeat(48);
        config.database.url = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingDatabaseUrl)));

        config.database.url = Some("postgres://localhost/tenant_admin".to_string());
        assert!(config.validate().is_ok());
    }
}
