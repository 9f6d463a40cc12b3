use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio::runtime::Handle;
use tokio_postgres::Client;
use tracing::{debug, warn};

use super::config::PgManager;
use super::statement::PostgresStatement;
use crate::driver::{DriverConnection, DriverStatement, StatementKind};
use crate::error::SqlHandleError;

/// Pooled PostgreSQL connection.
///
/// Dropping the last handle while a transaction is open spawns a `ROLLBACK` before the client
/// goes back to the pool.
#[derive(Clone)]
pub struct PostgresConnection {
    inner: Arc<PgCheckout>,
}

pub(super) struct PgCheckout {
    conn: Option<PooledConnection<'static, PgManager>>,
    in_transaction: AtomicBool,
}

impl PgCheckout {
    pub(super) fn client(&self) -> Result<&Client, SqlHandleError> {
        self.conn.as_deref().ok_or_else(|| {
            SqlHandleError::ConnectionError("postgres connection already taken".into())
        })
    }
}

impl Drop for PgCheckout {
    fn drop(&mut self) {
        if self.in_transaction.load(Ordering::Acquire)
            && let Some(conn) = self.conn.take()
            && let Ok(handle) = Handle::try_current()
        {
            handle.spawn(async move {
                match conn.simple_query("ROLLBACK").await {
                    Ok(_) => debug!("rolled back open postgres transaction on drop"),
                    Err(err) => warn!(error = %err, "postgres rollback on drop failed"),
                }
            });
        }
    }
}

impl PostgresConnection {
    pub(crate) fn new(conn: PooledConnection<'static, PgManager>) -> Self {
        Self {
            inner: Arc::new(PgCheckout {
                conn: Some(conn),
                in_transaction: AtomicBool::new(false),
            }),
        }
    }

    /// The raw `tokio-postgres` client.
    ///
    /// # Errors
    /// Returns `ConnectionError` if the client was already handed back.
    pub fn client(&self) -> Result<&Client, SqlHandleError> {
        self.inner.client()
    }

    async fn finish_tx(&self, sql: &str) -> Result<(), SqlHandleError> {
        if !self.inner.in_transaction.load(Ordering::Acquire) {
            return Err(SqlHandleError::ConnectionError(format!(
                "postgres {sql} without an open transaction"
            )));
        }
        self.inner.client()?.batch_execute(sql).await?;
        self.inner.in_transaction.store(false, Ordering::Release);
        Ok(())
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field(
                "in_transaction",
                &self.inner.in_transaction.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DriverConnection for PostgresConnection {
    fn driver_name(&self) -> &'static str {
        "postgres"
    }

    async fn prepare(
        &self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Box<dyn DriverStatement>, SqlHandleError> {
        let statement = PostgresStatement::prepare(Arc::clone(&self.inner), sql, kind).await?;
        Ok(Box::new(statement))
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), SqlHandleError> {
        let client = self.inner.client()?;
        if self.inner.in_transaction.load(Ordering::Acquire) {
            client.batch_execute(sql).await?;
            return Ok(());
        }
        client.batch_execute("BEGIN").await?;
        match client.batch_execute(sql).await {
            Ok(()) => {
                client.batch_execute("COMMIT").await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = client.batch_execute("ROLLBACK").await {
                    warn!(error = %rollback_err, "postgres batch rollback failed");
                }
                Err(err.into())
            }
        }
    }

    async fn is_auto_commit(&self) -> Result<bool, SqlHandleError> {
        Ok(!self.inner.in_transaction.load(Ordering::Acquire))
    }

    async fn begin(&self) -> Result<(), SqlHandleError> {
        if self.inner.in_transaction.load(Ordering::Acquire) {
            return Err(SqlHandleError::ConnectionError(
                "postgres transaction already open".into(),
            ));
        }
        self.inner.client()?.batch_execute("BEGIN").await?;
        self.inner.in_transaction.store(true, Ordering::Release);
        Ok(())
    }

    async fn commit(&self) -> Result<(), SqlHandleError> {
        self.finish_tx("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), SqlHandleError> {
        self.finish_tx("ROLLBACK").await
    }
}
