use std::sync::Arc;

use super::{Cursor, ResultCursor, StatementCore};
use crate::driver::{DriverOutcome, StatementKind};
use crate::error::SqlHandleError;
use crate::registry::ConnectionRegistry;

/// Row-returning query with a forward-only cursor.
pub struct Select {
    core: StatementCore,
    cursor: Cursor,
    precached: bool,
}

impl Select {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            core: StatementCore::new(registry),
            cursor: Cursor::default(),
            precached: false,
        }
    }

    /// Run the query and position the cursor before the first row.
    ///
    /// # Errors
    /// `AlreadyOpen`, `NoSql`, or `ExecutionFailed` wrapping the driver's error.
    pub async fn execute(&mut self) -> Result<&mut Self, SqlHandleError> {
        self.core.ensure_closed()?;
        self.precached = false;
        self.cursor.clear();
        let outcome = self.core.execute(StatementKind::Query).await?;
        match outcome {
            DriverOutcome::Rows(rs) => self.cursor.load(rs),
            DriverOutcome::Call(call) => match call.result_set {
                Some(rs) => self.cursor.load(rs),
                None => self.cursor.clear(),
            },
            DriverOutcome::RowsAffected { .. } => self.cursor.clear(),
        }
        Ok(self)
    }

    /// Run the query, keep every row in memory and release the statement and connection at
    /// once. Rows stay readable after `close()` until the next execution.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn execute_precached(&mut self) -> Result<&mut Self, SqlHandleError> {
        self.execute().await?;
        self.core.close_with(true).await;
        self.precached = true;
        Ok(self)
    }

    /// Release the statement and connection. The rows are dropped unless the query ran with
    /// [`execute_precached`](Self::execute_precached). Never fails.
    pub async fn close_with(&mut self, commit: bool) {
        self.core.close_with(commit).await;
        if !self.precached {
            self.cursor.clear();
        }
    }
}

super::statement_handle!(Select);

impl ResultCursor for Select {
    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
