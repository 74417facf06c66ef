//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `USERSTORE_DATABASE_URL` - `SQLite` connection string, e.g.
//!   `sqlite://data/users.db` (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `USERSTORE_CONNECT_TIMEOUT_SECS` - Connect and lease checkout timeout (default: 5)
//! - `USERSTORE_MAX_CONNECTIONS` - Pool size (default: 10)

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connection settings for the store.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct StoreConfig {
    /// Database connection URL (may contain credentials)
    pub database_url: SecretString,
    /// Bound on dialing the pool and on every lease checkout
    pub connect_timeout: Duration,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_url", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl StoreConfig {
    /// Configuration for `database_url` with default pool settings.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: SecretString::from(database_url.into()),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("USERSTORE_DATABASE_URL")
            .or_else(|| get("DATABASE_URL"))
            .ok_or_else(|| ConfigError::MissingEnvVar("USERSTORE_DATABASE_URL".to_string()))?;

        let connect_timeout_secs = parse_or_default(
            &get,
            "USERSTORE_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let max_connections =
            parse_or_default(&get, "USERSTORE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "USERSTORE_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self::new(database_url)
            .with_connect_timeout(Duration::from_secs(connect_timeout_secs))
            .with_max_connections(max_connections))
    }

    /// The database URL, for handing to the driver.
    #[must_use]
    pub fn expose_database_url(&self) -> &str {
        self.database_url.expose_secret()
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or_default<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
