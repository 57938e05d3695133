//! Connection configuration for the PostgreSQL backend.
//!
//! Host and port have defaults (`localhost`, `5432`). Database name, user and
//! password do not; leaving any of them unset is a
//! [`RagStoreError::Config`] raised before a connection is attempted.

use std::fmt;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::error::{RagStoreError, Result};

/// Default database host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default database port.
pub const DEFAULT_PORT: u16 = 5432;
/// Default time allowed for establishing the session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_HOST: &str = "POSTGRES_HOST";
const ENV_PORT: &str = "POSTGRES_PORT";
const ENV_DB: &str = "POSTGRES_DB";
const ENV_USER: &str = "POSTGRES_USER";
const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";
const ENV_STATEMENT_TIMEOUT_MS: &str = "POSTGRES_STATEMENT_TIMEOUT_MS";

/// Validated PostgreSQL connection settings.
///
/// Construct one with [`PgConfig::builder()`] or load it from the
/// environment with [`PgConfig::from_env()`].
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::PgConfig;
///
/// let config = PgConfig::builder()
///     .database("rag")
///     .user("postgres")
///     .password("secret")
///     .build()?;
/// assert_eq!(config.port, 5432);
/// ```
#[derive(Clone, PartialEq)]
pub struct PgConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Time allowed for establishing the session.
    pub connect_timeout: Duration,
    /// Server-side statement timeout applied to the session, if any.
    ///
    /// Bounds long similarity scans over large corpora.
    pub statement_timeout: Option<Duration>,
}

impl PgConfig {
    /// Create a new builder for constructing a [`PgConfig`].
    pub fn builder() -> PgConfigBuilder {
        PgConfigBuilder::default()
    }

    /// Load the configuration from `POSTGRES_*` environment variables.
    ///
    /// | Variable | Required | Default |
    /// |---|---|---|
    /// | `POSTGRES_HOST` | no | `localhost` |
    /// | `POSTGRES_PORT` | no | `5432` |
    /// | `POSTGRES_DB` | yes | |
    /// | `POSTGRES_USER` | yes | |
    /// | `POSTGRES_PASSWORD` | yes | |
    /// | `POSTGRES_STATEMENT_TIMEOUT_MS` | no | none |
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Config`] if a required variable is missing or
    /// a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(host) = env_var(ENV_HOST) {
            builder = builder.host(host);
        }
        if let Some(port) = env_var(ENV_PORT) {
            let port = port.parse::<u16>().map_err(|e| {
                RagStoreError::Config(format!("{ENV_PORT} must be a port number: {e}"))
            })?;
            builder = builder.port(port);
        }
        if let Some(database) = env_var(ENV_DB) {
            builder = builder.database(database);
        }
        if let Some(user) = env_var(ENV_USER) {
            builder = builder.user(user);
        }
        if let Some(password) = env_var(ENV_PASSWORD) {
            builder = builder.password(password);
        }
        if let Some(timeout) = env_var(ENV_STATEMENT_TIMEOUT_MS) {
            let millis = timeout.parse::<u64>().map_err(|e| {
                RagStoreError::Config(format!(
                    "{ENV_STATEMENT_TIMEOUT_MS} must be a number of milliseconds: {e}"
                ))
            })?;
            builder = builder.statement_timeout(Duration::from_millis(millis));
        }

        builder.build()
    }

    /// Load a `.env` file from the working directory (if present), then
    /// call [`PgConfig::from_env()`].
    pub fn from_dotenv() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Re-check the invariants enforced by [`PgConfigBuilder::build()`].
    ///
    /// Fields are public, so a config may have been edited after it was built.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RagStoreError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(RagStoreError::Config("port must be greater than zero".to_string()));
        }
        for (name, value) in
            [("database", &self.database), ("user", &self.user), ("password", &self.password)]
        {
            if value.is_empty() {
                return Err(RagStoreError::Config(format!("{name} is required")));
            }
        }
        if self.statement_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RagStoreError::Config(
                "statement_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert into sqlx connect options.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .application_name("ragstore")
    }
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Builder for constructing a validated [`PgConfig`].
#[derive(Debug, Clone, Default)]
pub struct PgConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    connect_timeout: Option<Duration>,
    statement_timeout: Option<Duration>,
}

impl PgConfigBuilder {
    /// Set the database host. Defaults to `localhost`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port. Defaults to `5432`.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the login role.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the time allowed for establishing the session.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set a server-side statement timeout for the session.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Build the [`PgConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Config`] if:
    /// - database, user or password is unset
    /// - the host is empty or the port is zero
    /// - the statement timeout is zero
    pub fn build(self) -> Result<PgConfig> {
        let database =
            self.database.ok_or_else(|| RagStoreError::Config("database is required".into()))?;
        let user = self.user.ok_or_else(|| RagStoreError::Config("user is required".into()))?;
        let password =
            self.password.ok_or_else(|| RagStoreError::Config("password is required".into()))?;

        let config = PgConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            database,
            user,
            password,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            statement_timeout: self.statement_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}
