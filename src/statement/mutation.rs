use std::sync::Arc;

use super::StatementCore;
use crate::driver::{DriverOutcome, StatementKind};
use crate::error::SqlHandleError;
use crate::registry::ConnectionRegistry;

/// Rows touched by an outcome, if the outcome reports any.
fn affected(outcome: &DriverOutcome) -> Option<usize> {
    match outcome {
        DriverOutcome::RowsAffected { count, .. } => Some(*count),
        DriverOutcome::Rows(rs) => Some(rs.rows_affected),
        DriverOutcome::Call(call) => call.update_count,
    }
}

fn as_count(rows: Option<usize>) -> i64 {
    rows.and_then(|n| i64::try_from(n).ok()).unwrap_or(-1)
}

/// `UPDATE`, `DELETE` or DDL statement reporting a row count.
pub struct Update {
    core: StatementCore,
    row_count: i64,
}

impl Update {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            core: StatementCore::new(registry),
            row_count: -1,
        }
    }

    /// Run the statement.
    ///
    /// # Errors
    /// `AlreadyOpen`, `NoSql`, or `ExecutionFailed` wrapping the driver's error.
    pub async fn execute(&mut self) -> Result<&mut Self, SqlHandleError> {
        self.core.ensure_closed()?;
        self.row_count = -1;
        let outcome = self.core.execute(StatementKind::Update).await?;
        self.row_count = as_count(affected(&outcome));
        Ok(self)
    }

    /// Rows affected by the last execution, `-1` before any.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Release the statement; an automatic connection is committed (when `commit`) and returned
    /// to the registry. Never fails.
    pub async fn close_with(&mut self, commit: bool) {
        self.core.close_with(commit).await;
    }
}

super::statement_handle!(Update);

/// `INSERT` statement reporting a row count and the first generated key.
pub struct Insert {
    core: StatementCore,
    row_count: i64,
    generated_key: i64,
}

impl Insert {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            core: StatementCore::new(registry),
            row_count: -1,
            generated_key: -1,
        }
    }

    /// Run the statement and capture the generated key.
    ///
    /// # Errors
    /// `AlreadyOpen`, `NoSql`, or `ExecutionFailed` wrapping the driver's error.
    pub async fn execute(&mut self) -> Result<&mut Self, SqlHandleError> {
        self.core.ensure_closed()?;
        self.row_count = -1;
        self.generated_key = -1;
        let outcome = self.core.execute(StatementKind::Insert).await?;
        self.row_count = as_count(affected(&outcome));
        if let DriverOutcome::RowsAffected {
            generated_key: Some(key),
            ..
        } = outcome
        {
            self.generated_key = key;
        }
        Ok(self)
    }

    /// Rows inserted by the last execution, `-1` before any.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// First auto-generated key of the last execution; `-1` when the table has no
    /// auto-increment key or nothing was inserted.
    #[must_use]
    pub fn generated_key(&self) -> i64 {
        self.generated_key
    }

    pub async fn close_with(&mut self, commit: bool) {
        self.core.close_with(commit).await;
    }
}

super::statement_handle!(Insert);
