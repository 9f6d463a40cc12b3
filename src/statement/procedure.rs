use std::sync::Arc;

use tracing::debug;

use super::{Cursor, ResultCursor, StatementCore};
use crate::driver::{DriverOutcome, StatementKind};
use crate::error::SqlHandleError;
use crate::registry::ConnectionRegistry;

/// Stored procedure call with OUT/INOUT parameters.
///
/// Only the first outcome of the call is captured: whether it produced rows, or how many
/// rows it updated.
pub struct StoredProcedure {
    core: StatementCore,
    cursor: Cursor,
    has_result_set: bool,
    update_count: i64,
}

impl StoredProcedure {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            core: StatementCore::new(registry),
            cursor: Cursor::default(),
            has_result_set: false,
            update_count: -1,
        }
    }

    /// Call the procedure and copy each output value into its OUT/INOUT marker.
    ///
    /// # Errors
    /// `AlreadyOpen`, `NoSql`, or `ExecutionFailed` wrapping the driver's error.
    pub async fn execute(&mut self) -> Result<&mut Self, SqlHandleError> {
        self.core.ensure_closed()?;
        self.has_result_set = false;
        self.update_count = -1;
        self.cursor.clear();

        let call = match self.core.execute(StatementKind::Call).await? {
            DriverOutcome::Call(call) => call,
            DriverOutcome::Rows(rs) => crate::driver::CallOutcome {
                result_set: Some(rs),
                ..Default::default()
            },
            DriverOutcome::RowsAffected { count, .. } => crate::driver::CallOutcome {
                update_count: Some(count),
                ..Default::default()
            },
        };

        self.update_count = call
            .update_count
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1);
        if let Some(rs) = call.result_set {
            self.has_result_set = true;
            self.cursor.load(rs);
        }

        let mut received = call.out_values.into_iter();
        for arg in self.core.args() {
            if let Some(slot) = arg.output_slot() {
                let value = received.next().unwrap_or_default();
                slot.set(value);
            }
        }
        debug!(
            has_result_set = self.has_result_set,
            update_count = self.update_count,
            "procedure call finished"
        );
        Ok(self)
    }

    /// Whether the first outcome was a result set.
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        self.has_result_set
    }

    /// Rows updated by the first outcome, `-1` when it was a result set.
    #[must_use]
    pub fn update_count(&self) -> i64 {
        self.update_count
    }

    pub async fn close_with(&mut self, commit: bool) {
        self.core.close_with(commit).await;
        self.cursor.clear();
    }
}

super::statement_handle!(StoredProcedure);

impl ResultCursor for StoredProcedure {
    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
