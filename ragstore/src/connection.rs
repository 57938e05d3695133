//! Connection manager: one owned PostgreSQL session.
//!
//! A [`Connection`] is opened once and held for its owner's lifetime. There
//! is no pooling and no automatic reconnect; a lost session surfaces as
//! [`RagStoreError::Connection`] and the caller decides whether to open a new
//! one.

use std::fmt;
use std::time::Duration;

use sqlx::{Connection as _, PgConnection, Row};
use tracing::{debug, info, warn};

use crate::config::PgConfig;
use crate::error::{RagStoreError, Result};

/// Diagnostics gathered right after the session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Output of `SELECT version()`.
    pub server_version: String,
    /// Installed pgvector version, if the extension is present.
    pub vector_extension: Option<String>,
    /// Tables in the `public` schema, sorted by name.
    pub tables: Vec<String>,
}

impl ServerInfo {
    /// One-line human readable capability summary.
    pub fn summary(&self) -> String {
        let vector = match &self.vector_extension {
            Some(version) => format!("pgvector {version}"),
            None => "pgvector not installed".to_string(),
        };
        let tables = if self.tables.is_empty() {
            "no tables".to_string()
        } else {
            format!("{} tables ({})", self.tables.len(), self.tables.join(", "))
        };
        format!("{}; {vector}; {tables}", self.server_version)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// An owned PostgreSQL session.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::{Connection, PgConfig};
///
/// let mut conn = Connection::open(&PgConfig::from_env()?).await?;
/// if let Some(info) = conn.server_info() {
///     println!("{info}");
/// }
/// conn.close().await;
/// conn.close().await; // no-op
/// ```
pub struct Connection {
    inner: Option<PgConnection>,
    server_info: Option<ServerInfo>,
}

impl Connection {
    /// Open a session using the given configuration.
    ///
    /// The configuration is validated before any I/O. After connecting, the
    /// session's statement timeout is applied and a best-effort probe collects
    /// [`ServerInfo`]; a failed probe is logged and never fails the open.
    ///
    /// # Errors
    ///
    /// - [`RagStoreError::Config`] if the configuration is invalid
    /// - [`RagStoreError::Connection`] if the session cannot be established
    ///   within `connect_timeout`, or the statement timeout cannot be applied
    pub async fn open(config: &PgConfig) -> Result<Self> {
        config.validate()?;

        let options = config.connect_options();
        let mut conn =
            match tokio::time::timeout(config.connect_timeout, PgConnection::connect_with(&options))
                .await
            {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    return Err(RagStoreError::Connection(format!(
                        "failed to connect to {}:{}/{}: {e}",
                        config.host, config.port, config.database
                    )));
                }
                Err(_) => {
                    return Err(RagStoreError::Connection(format!(
                        "timed out after {:?} connecting to {}:{}/{}",
                        config.connect_timeout, config.host, config.port, config.database
                    )));
                }
            };

        if let Some(timeout) = config.statement_timeout {
            let sql = statement_timeout_sql(timeout);
            sqlx::query(&sql).execute(&mut conn).await.map_err(|e| {
                RagStoreError::Connection(format!("failed to apply statement timeout: {e}"))
            })?;
        }

        let server_info = match probe(&mut conn).await {
            Ok(info) => {
                info!(host = %config.host, database = %config.database, "{}", info.summary());
                Some(info)
            }
            Err(e) => {
                warn!(error = %e, "connection probe failed");
                None
            }
        };

        debug!(host = %config.host, port = config.port, database = %config.database, "connected");
        Ok(Self { inner: Some(conn), server_info })
    }

    /// Diagnostics from the post-connect probe, if it succeeded.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Whether the session has not been closed.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Borrow the live session.
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Connection`] if the connection was closed.
    pub fn session(&mut self) -> Result<&mut PgConnection> {
        self.inner
            .as_mut()
            .ok_or_else(|| RagStoreError::Connection("connection is closed".to_string()))
    }

    /// Round-trip a trivial query to check the session is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.session()?
            .ping()
            .await
            .map_err(|e| RagStoreError::Connection(format!("ping failed: {e}")))
    }

    /// Close the session. Calling this more than once is a no-op.
    ///
    /// Errors during the termination handshake are logged, not returned:
    /// the session is released either way.
    pub async fn close(&mut self) {
        if let Some(conn) = self.inner.take() {
            match conn.close().await {
                Ok(()) => debug!("connection closed"),
                Err(e) => warn!(error = %e, "error while closing connection"),
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("server_info", &self.server_info)
            .finish()
    }
}

async fn probe(conn: &mut PgConnection) -> std::result::Result<ServerInfo, sqlx::Error> {
    let server_version: String =
        sqlx::query("SELECT version()").fetch_one(&mut *conn).await?.try_get(0)?;

    let vector_extension: Option<String> =
        match sqlx::query("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_optional(&mut *conn)
            .await?
        {
            Some(row) => Some(row.try_get(0)?),
            None => None,
        };

    let tables = sqlx::query(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = 'public' ORDER BY table_name",
    )
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(|row| row.try_get::<String, _>(0))
    .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ServerInfo { server_version, vector_extension, tables })
}

/// `SET statement_timeout` for a duration, in whole milliseconds rounded up.
///
/// A value of 0 would disable the timeout, so anything shorter than a
/// millisecond becomes 1.
fn statement_timeout_sql(timeout: Duration) -> String {
    // SET does not accept bind parameters.
    let millis = timeout.as_micros().div_ceil(1000).max(1);
    format!("SET statement_timeout = {millis}")
}
