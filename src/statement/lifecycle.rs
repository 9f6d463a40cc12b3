use std::sync::Arc;

use tracing::{Level, debug, enabled, warn};

use crate::args::Arg;
use crate::coercion::{bind_args, format_statement};
use crate::driver::{Connection, DriverOutcome, DriverStatement, StatementKind};
use crate::error::SqlHandleError;
use crate::registry::ConnectionRegistry;

/// Who is responsible for the bound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Acquired from the registry by `execute()` and released by `close()`.
    Automatic,
    /// Supplied by the caller, who commits, rolls back and releases it.
    Explicit,
}

/// State and lifecycle shared by every statement kind.
pub struct StatementCore {
    sql: Option<String>,
    args: Vec<Arg>,
    source_name: Option<String>,
    ownership: Ownership,
    connection: Option<Connection>,
    statement: Option<Box<dyn DriverStatement>>,
    registry: Arc<ConnectionRegistry>,
}

impl StatementCore {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            sql: None,
            args: Vec::new(),
            source_name: None,
            ownership: Ownership::Automatic,
            connection: None,
            statement: None,
            registry,
        }
    }

    /// Open means mid-execution: an automatic connection is held, or the explicit connection
    /// has a live statement.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match self.ownership {
            Ownership::Automatic => self.connection.is_some(),
            Ownership::Explicit => self.statement.is_some(),
        }
    }

    fn guard(&self, what: &str) -> bool {
        if self.is_open() {
            debug!(setting = what, "statement is open; ignoring change");
            false
        } else {
            true
        }
    }

    pub fn set_sql(&mut self, sql: String) {
        if self.guard("sql") {
            self.sql = Some(sql);
        }
    }

    pub fn set_source_name(&mut self, name: Option<String>) {
        if self.guard("source name") {
            self.source_name = name;
        }
    }

    pub fn set_args(&mut self, args: Vec<Arg>) {
        if self.guard("args") {
            self.args = args;
        }
    }

    pub fn add_args(&mut self, args: impl IntoIterator<Item = Arg>) {
        if self.guard("args") {
            self.args.extend(args);
        }
    }

    /// `Some` switches to an explicit, caller-managed connection; `None` back to automatic.
    pub fn set_connection(&mut self, connection: Option<Connection>) {
        if self.guard("connection") {
            self.ownership = if connection.is_some() {
                Ownership::Explicit
            } else {
                Ownership::Automatic
            };
            self.connection = connection;
        }
    }

    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Reject a new execution while the previous one still holds a live statement.
    ///
    /// # Errors
    /// `AlreadyOpen` until `close()` runs.
    pub fn ensure_closed(&self) -> Result<(), SqlHandleError> {
        if self.statement.is_some() {
            return Err(SqlHandleError::AlreadyOpen);
        }
        Ok(())
    }

    /// Acquire (if needed), prepare, bind and execute.
    ///
    /// # Errors
    /// `AlreadyOpen` if the previous execution was not closed, `NoSql` without SQL text, and
    /// `ExecutionFailed` wrapping any acquire, prepare, bind or execute failure.
    pub async fn execute(&mut self, kind: StatementKind) -> Result<DriverOutcome, SqlHandleError> {
        self.ensure_closed()?;
        let Some(sql) = self.sql.clone() else {
            return Err(SqlHandleError::NoSql);
        };
        self.run(&sql, kind)
            .await
            .map_err(SqlHandleError::execution_failed)
    }

    async fn run(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<DriverOutcome, SqlHandleError> {
        let conn = match &self.connection {
            Some(conn) => conn.clone(),
            None => {
                let conn = self.registry.acquire(self.source_name.as_deref()).await?;
                self.ownership = Ownership::Automatic;
                self.connection = Some(conn.clone());
                conn
            }
        };

        let mut statement = conn.prepare(sql, kind).await?;
        if enabled!(Level::DEBUG) {
            debug!(
                driver = conn.driver_name(),
                ?kind,
                sql = %format_statement(sql, &self.args),
                "executing statement"
            );
        }

        let bound = bind_args(&self.args)
            .into_iter()
            .enumerate()
            .try_for_each(|(idx, binding)| statement.bind(idx + 1, binding));
        let outcome = match bound {
            Ok(()) => statement.execute().await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(outcome) => {
                self.statement = Some(statement);
                Ok(outcome)
            }
            Err(err) => {
                if let Err(close_err) = statement.close().await {
                    debug!(error = %close_err, "closing failed statement");
                }
                Err(err)
            }
        }
    }

    /// Release the live statement and, for an automatic connection, commit when `commit` is set
    /// and return the connection to the registry. Never fails; problems are logged.
    pub async fn close_with(&mut self, commit: bool) {
        if let Some(mut statement) = self.statement.take()
            && let Err(err) = statement.close().await
        {
            debug!(error = %err, "error closing statement");
        }

        if self.ownership == Ownership::Explicit {
            return;
        }
        let Some(conn) = self.connection.take() else {
            return;
        };
        if commit {
            match conn.is_auto_commit().await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(err) = conn.commit().await {
                        warn!(error = %err, "commit on close failed");
                    }
                }
                Err(err) => debug!(error = %err, "could not read auto-commit state"),
            }
        }
        self.registry
            .release(self.source_name.as_deref(), conn)
            .await;
    }
}

impl Drop for StatementCore {
    fn drop(&mut self) {
        if self.ownership == Ownership::Automatic && self.connection.is_some() {
            debug!("statement dropped while open; connection returned without commit");
        }
    }
}
