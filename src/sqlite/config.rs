use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::{SqliteConnection, run_blocking};
use crate::driver::{Connection, ConnectionProvider};
use crate::error::SqlHandleError;

/// A `rusqlite` connection shared between the async side and blocking workers.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Options for configuring a `SQLite` source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqliteOptions {
    pub db_path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Switch the database to WAL journaling on connect.
    #[serde(default = "default_wal")]
    pub wal: bool,
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_wal() -> bool {
    true
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            wal: true,
        }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size.max(1);
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a provider and check that a connection can be opened.
    ///
    /// # Errors
    ///
    /// Returns `SqlHandleError` if pool creation or the initial connection fails.
    pub async fn build(self) -> Result<SqliteProvider, SqlHandleError> {
        SqliteProvider::new(self.finish()).await
    }
}

/// bb8 manager for `rusqlite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    options: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlHandleError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let options = self.options.clone();
        let path = options.db_path.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&options.db_path)?;
                conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;
                if options.wal {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                Ok::<_, SqlHandleError>(conn)
            })
            .await
            .map_err(|e| {
                SqlHandleError::ConnectionError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
            debug!(path = %path, "opened sqlite connection");
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .execute_batch("SELECT 1")
                    .map_err(SqlHandleError::SqliteError)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Connection source for one `SQLite` database file.
#[derive(Clone)]
pub struct SqliteProvider {
    pool: Pool<SqliteManager>,
    db_path: String,
}

impl SqliteProvider {
    /// Build a pool and open one connection to surface configuration errors early.
    ///
    /// # Errors
    /// Returns `SqlHandleError::ConnectionError` if the pool cannot be created.
    pub async fn new(options: SqliteOptions) -> Result<Self, SqlHandleError> {
        let db_path = options.db_path.clone();
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build(SqliteManager::new(options))
            .await
            .map_err(|e| {
                SqlHandleError::ConnectionError(format!("Failed to create SQLite pool: {e}"))
            })?;
        Ok(Self { pool, db_path })
    }

    /// Build a pool that opens connections on first checkout.
    #[must_use]
    pub fn new_lazy(options: SqliteOptions) -> Self {
        let db_path = options.db_path.clone();
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build_unchecked(SqliteManager::new(options));
        Self { pool, db_path }
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }
}

impl fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("db_path", &self.db_path)
            .field("state", &self.pool.state())
            .finish()
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    fn driver_name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<Connection, SqlHandleError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            SqlHandleError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        Ok(Connection::new(SqliteConnection::new(conn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SqliteOptions = serde_json::from_str(r#"{"dbPath": "app.db", "wal": false}"#)
            .expect("valid options");
        assert_eq!(opts.db_path, "app.db");
        assert_eq!(opts.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(opts.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(!opts.wal);
    }

    #[test]
    fn builder_clamps_pool_size() {
        let opts = SqliteOptions::builder("x.db")
            .pool_size(0)
            .busy_timeout(Duration::from_secs(1))
            .finish();
        assert_eq!(opts.pool_size, 1);
        assert_eq!(opts.busy_timeout_ms, 1_000);
    }
}
