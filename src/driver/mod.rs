//! Driver capability seam.
//!
//! Statement handles never talk to `rusqlite` or `tokio-postgres` directly. They go through
//! the traits in this module: a [`ConnectionProvider`] yields [`Connection`]s, a connection
//! prepares [`DriverStatement`]s, and a statement executes into a [`DriverOutcome`].
//! SQL text uses `?` positional placeholders; drivers translate as needed.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SqlHandleError;
use crate::results::ResultSet;
use crate::types::{RowValues, SqlType};

/// What a statement is prepared for. Drivers use it to pick the execution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Mutation reporting a row count.
    Update,
    /// Mutation reporting a row count and the generated key.
    Insert,
    /// Row-returning query.
    Query,
    /// Callable statement with OUT/INOUT parameters.
    Call,
}

/// A single positional parameter, ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamBinding {
    /// Typed input value.
    Value { sql_type: SqlType, value: RowValues },
    /// SQL NULL.
    Null,
    /// Output-only registration; no value is sent.
    Out(SqlType),
    /// Typed input value that is also registered for output.
    InOut { sql_type: SqlType, value: RowValues },
    /// A value whose mapping is left to the driver's own conversion.
    Generic(RowValues),
}

impl ParamBinding {
    /// The value sent to the database, if any.
    #[must_use]
    pub fn value(&self) -> Option<&RowValues> {
        match self {
            ParamBinding::Value { value, .. }
            | ParamBinding::InOut { value, .. }
            | ParamBinding::Generic(value) => Some(value),
            ParamBinding::Null => Some(&RowValues::Null),
            ParamBinding::Out(_) => None,
        }
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        matches!(self, ParamBinding::Out(_) | ParamBinding::InOut { .. })
    }

    /// Declared type, when the binding carries one.
    #[must_use]
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            ParamBinding::Value { sql_type, .. }
            | ParamBinding::InOut { sql_type, .. }
            | ParamBinding::Out(sql_type) => Some(*sql_type),
            ParamBinding::Null | ParamBinding::Generic(_) => None,
        }
    }
}

/// Result of a callable statement. Only the first outcome of a multi-result call is kept.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    pub result_set: Option<ResultSet>,
    pub update_count: Option<usize>,
    /// Values for the registered OUT/INOUT parameters, in registration order.
    pub out_values: Vec<RowValues>,
}

/// What a driver statement produced.
#[derive(Debug, Clone)]
pub enum DriverOutcome {
    RowsAffected {
        count: usize,
        /// First auto-generated key, for statements prepared as [`StatementKind::Insert`].
        generated_key: Option<i64>,
    },
    Rows(ResultSet),
    Call(CallOutcome),
}

/// Something that can open live connections: a pool, a single-connection factory, or a fake.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + fmt::Debug {
    /// Short driver label used in logs, e.g. `"sqlite"`.
    fn driver_name(&self) -> &'static str;

    /// Check out (or open) a connection.
    ///
    /// # Errors
    /// Returns the driver's error when no connection can be produced.
    async fn connect(&self) -> Result<Connection, SqlHandleError>;
}

/// A live connection as seen by statement handles.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    fn driver_name(&self) -> &'static str;

    /// Prepare `sql` for execution as `kind`.
    ///
    /// # Errors
    /// Returns the driver's error if the SQL cannot be prepared.
    async fn prepare(
        &self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Box<dyn DriverStatement>, SqlHandleError>;

    /// Run one or more statements without parameters.
    ///
    /// # Errors
    /// Returns the driver's error if any statement fails.
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlHandleError>;

    /// `false` while a transaction started with [`begin`](DriverConnection::begin) is open.
    ///
    /// # Errors
    /// Returns an error if the connection state cannot be read.
    async fn is_auto_commit(&self) -> Result<bool, SqlHandleError>;

    /// # Errors
    /// Returns the driver's error, including when a transaction is already open.
    async fn begin(&self) -> Result<(), SqlHandleError>;

    /// # Errors
    /// Returns the driver's error, including when no transaction is open.
    async fn commit(&self) -> Result<(), SqlHandleError>;

    /// # Errors
    /// Returns the driver's error, including when no transaction is open.
    async fn rollback(&self) -> Result<(), SqlHandleError>;

    /// Prepare the connection for return to its source. Pending work is rolled back.
    ///
    /// # Errors
    /// Returns the driver's error if the rollback fails.
    async fn release(&self) -> Result<(), SqlHandleError> {
        if self.is_auto_commit().await? {
            Ok(())
        } else {
            self.rollback().await
        }
    }
}

/// A prepared statement owned by one statement handle.
#[async_trait]
pub trait DriverStatement: Send {
    /// Bind the parameter at 1-based `index`.
    ///
    /// # Errors
    /// Returns `ParameterError` when the index or value cannot be bound.
    fn bind(&mut self, index: usize, binding: ParamBinding) -> Result<(), SqlHandleError>;

    /// # Errors
    /// Returns the driver's error if execution fails.
    async fn execute(&mut self) -> Result<DriverOutcome, SqlHandleError>;

    /// Release driver resources held by the statement.
    ///
    /// # Errors
    /// Returns the driver's error; callers treat it as best effort.
    async fn close(&mut self) -> Result<(), SqlHandleError>;
}

/// A shareable handle to a live connection.
///
/// Clones refer to the same underlying connection. The pooled connection goes back to its
/// pool when the last clone is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<dyn DriverConnection>,
}

impl Connection {
    pub fn new<C: DriverConnection + 'static>(conn: C) -> Self {
        Self {
            inner: Arc::new(conn),
        }
    }

    #[must_use]
    pub fn from_arc(inner: Arc<dyn DriverConnection>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn driver_name(&self) -> &'static str {
        self.inner.driver_name()
    }

    /// True if both handles refer to the same live connection.
    #[must_use]
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// # Errors
    /// Returns the driver's error if the batch fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlHandleError> {
        self.inner.execute_batch(sql).await
    }

    /// # Errors
    /// Returns an error if the connection state cannot be read.
    pub async fn is_auto_commit(&self) -> Result<bool, SqlHandleError> {
        self.inner.is_auto_commit().await
    }

    /// Start a transaction; statements run on this connection join it until commit or rollback.
    ///
    /// # Errors
    /// Returns the driver's error if a transaction is already open or `BEGIN` fails.
    pub async fn begin(&self) -> Result<(), SqlHandleError> {
        self.inner.begin().await
    }

    /// # Errors
    /// Returns the driver's error if no transaction is open or `COMMIT` fails.
    pub async fn commit(&self) -> Result<(), SqlHandleError> {
        self.inner.commit().await
    }

    /// # Errors
    /// Returns the driver's error if no transaction is open or `ROLLBACK` fails.
    pub async fn rollback(&self) -> Result<(), SqlHandleError> {
        self.inner.rollback().await
    }

    /// Roll back pending work and give up this handle.
    ///
    /// # Errors
    /// Returns the driver's error if the rollback fails; the handle is dropped regardless.
    pub async fn release(self) -> Result<(), SqlHandleError> {
        self.inner.release().await
    }

    pub(crate) async fn prepare(
        &self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Box<dyn DriverStatement>, SqlHandleError> {
        self.inner.prepare(sql, kind).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.inner.driver_name())
            .finish_non_exhaustive()
    }
}
