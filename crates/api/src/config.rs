//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `JWT_SECRET`: token signing secret (required)
/// - `TOKEN_TTL_SECS`: token lifetime (default: `86400`)
/// - `CHECKOUT_TIMEOUT_MS`: checkout deadline, retries included (default: `5000`)
/// - `CHECKOUT_MAX_ATTEMPTS`: attempts for retryable failures (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub checkout_timeout: Duration,
    pub checkout_max_attempts: u32,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            jwt_secret,
            token_ttl: Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_SECS", 86_400)?),
            checkout_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CHECKOUT_TIMEOUT_MS",
                5_000,
            )?),
            checkout_max_attempts: parse_or(
                &lookup,
                "CHECKOUT_MAX_ATTEMPTS",
                defaults.checkout_max_attempts,
            )?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: String::new(),
            token_ttl: Duration::from_secs(86_400),
            checkout_timeout: Duration::from_millis(5_000),
            checkout_max_attempts: 3,
        }
    }
}
