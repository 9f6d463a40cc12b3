use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::PooledConnection;
use tracing::{debug, warn};

use super::config::{SharedSqliteConnection, SqliteManager};
use super::statement::SqliteStatement;
use crate::driver::{DriverConnection, DriverStatement, StatementKind};
use crate::error::SqlHandleError;

/// Pooled `SQLite` connection.
///
/// Dropping the last handle while a transaction is open rolls it back synchronously before the
/// connection returns to the pool.
#[derive(Clone)]
pub struct SqliteConnection {
    inner: Arc<Checkout>,
}

pub(super) struct Checkout {
    conn: PooledConnection<'static, SqliteManager>,
}

impl Checkout {
    pub(super) fn handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        // A busy mutex means a worker still holds the connection; the pool validates it later.
        if let Ok(guard) = self.conn.try_lock()
            && !guard.is_autocommit()
        {
            match guard.execute_batch("ROLLBACK") {
                Ok(()) => debug!("rolled back open sqlite transaction on drop"),
                Err(err) => warn!(error = %err, "sqlite rollback on drop failed"),
            }
        }
    }
}

impl SqliteConnection {
    pub(crate) fn new(conn: PooledConnection<'static, SqliteManager>) -> Self {
        Self {
            inner: Arc::new(Checkout { conn }),
        }
    }

    /// Run synchronous work against the raw `rusqlite` connection on a blocking worker.
    ///
    /// # Errors
    /// Returns whatever `func` returns, or a join error if the worker panicked.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlHandleError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlHandleError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.inner.handle(), func).await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlHandleError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlHandleError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlHandleError::Other(format!("sqlite spawn_blocking join error: {e}")))?
}

async fn run_sql(conn: SharedSqliteConnection, sql: &'static str) -> Result<(), SqlHandleError> {
    run_blocking(conn, move |guard| {
        guard.execute_batch(sql).map_err(SqlHandleError::SqliteError)
    })
    .await
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    fn driver_name(&self) -> &'static str {
        "sqlite"
    }

    async fn prepare(
        &self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Box<dyn DriverStatement>, SqlHandleError> {
        let statement = SqliteStatement::prepare(Arc::clone(&self.inner), sql, kind).await?;
        Ok(Box::new(statement))
    }

    /// Wraps the batch in a transaction when none is open.
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlHandleError> {
        let sql_owned = sql.to_owned();
        run_blocking(self.inner.handle(), move |guard| {
            if guard.is_autocommit() {
                let tx = guard.transaction()?;
                tx.execute_batch(&sql_owned)?;
                tx.commit().map_err(SqlHandleError::SqliteError)
            } else {
                guard
                    .execute_batch(&sql_owned)
                    .map_err(SqlHandleError::SqliteError)
            }
        })
        .await
    }

    async fn is_auto_commit(&self) -> Result<bool, SqlHandleError> {
        let handle = self.inner.handle();
        let guard = handle.lock().await;
        Ok(guard.is_autocommit())
    }

    async fn begin(&self) -> Result<(), SqlHandleError> {
        run_sql(self.inner.handle(), "BEGIN").await
    }

    async fn commit(&self) -> Result<(), SqlHandleError> {
        run_sql(self.inner.handle(), "COMMIT").await
    }

    async fn rollback(&self) -> Result<(), SqlHandleError> {
        run_sql(self.inner.handle(), "ROLLBACK").await
    }
}
