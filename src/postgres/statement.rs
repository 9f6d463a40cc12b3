use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tracing::debug;

use super::connection::PgCheckout;
use super::params::binding_to_postgres_value;
use super::query::build_result_set_from_statement;
use crate::driver::{CallOutcome, DriverOutcome, DriverStatement, ParamBinding, StatementKind};
use crate::error::SqlHandleError;
use crate::placeholders::to_numbered;
use crate::types::RowValues;

/// Server-side prepared statement on a pooled client.
///
/// A callable statement is run as `CALL proc(...)`; PostgreSQL returns the OUT and INOUT
/// arguments as a single row, in declaration order.
pub struct PostgresStatement {
    conn: Arc<PgCheckout>,
    stmt: tokio_postgres::Statement,
    kind: StatementKind,
    bindings: BTreeMap<usize, ParamBinding>,
}

impl PostgresStatement {
    pub(super) async fn prepare(
        conn: Arc<PgCheckout>,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Self, SqlHandleError> {
        let numbered = to_numbered(sql);
        let stmt = conn.client()?.prepare(&numbered).await?;
        debug!(?kind, params = stmt.params().len(), "prepared postgres statement");
        Ok(Self {
            conn,
            stmt,
            kind,
            bindings: BTreeMap::new(),
        })
    }

    fn param_count(&self) -> usize {
        self.stmt.params().len()
    }

    fn output_count(&self) -> usize {
        self.bindings.values().filter(|b| b.is_output()).count()
    }

    fn bound_values(&self) -> Result<Vec<RowValues>, SqlHandleError> {
        (1..=self.param_count())
            .map(|idx| {
                self.bindings
                    .get(&idx)
                    .map(binding_to_postgres_value)
                    .ok_or_else(|| {
                        SqlHandleError::ParameterError(format!(
                            "No value bound for parameter {idx}"
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl DriverStatement for PostgresStatement {
    fn bind(&mut self, index: usize, binding: ParamBinding) -> Result<(), SqlHandleError> {
        if index == 0 || index > self.param_count() {
            return Err(SqlHandleError::ParameterError(format!(
                "Parameter index {index} out of range (statement has {} placeholders)",
                self.param_count()
            )));
        }
        self.bindings.insert(index, binding);
        Ok(())
    }

    async fn execute(&mut self) -> Result<DriverOutcome, SqlHandleError> {
        let values = self.bound_values()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let client = self.conn.client()?;
        let returns_rows = !self.stmt.columns().is_empty();

        if !returns_rows {
            let count = usize::try_from(client.execute(&self.stmt, &refs).await?).map_err(|e| {
                SqlHandleError::Other(format!("postgres affected rows conversion error: {e}"))
            })?;
            return Ok(match self.kind {
                StatementKind::Call => DriverOutcome::Call(CallOutcome {
                    result_set: None,
                    update_count: Some(count),
                    out_values: vec![RowValues::Null; self.output_count()],
                }),
                StatementKind::Query => {
                    DriverOutcome::Rows(build_result_set_from_statement(&self.stmt, &[])?)
                }
                StatementKind::Update | StatementKind::Insert => DriverOutcome::RowsAffected {
                    count,
                    generated_key: None,
                },
            });
        }

        let rows = client.query(&self.stmt, &refs).await?;
        let rs = build_result_set_from_statement(&self.stmt, &rows)?;
        Ok(match self.kind {
            StatementKind::Query => DriverOutcome::Rows(rs),
            // INSERT ... RETURNING id: the first returned column is the generated key
            StatementKind::Insert => DriverOutcome::RowsAffected {
                count: rs.len(),
                generated_key: rs
                    .results
                    .first()
                    .and_then(|row| row.get_by_index(0))
                    .and_then(|v| v.as_int().copied()),
            },
            StatementKind::Update => DriverOutcome::RowsAffected {
                count: rs.len(),
                generated_key: None,
            },
            StatementKind::Call => {
                let out_values = (0..self.output_count())
                    .map(|idx| {
                        rs.results
                            .first()
                            .and_then(|row| row.get_by_index(idx))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                DriverOutcome::Call(CallOutcome {
                    result_set: Some(rs),
                    update_count: None,
                    out_values,
                })
            }
        })
    }

    async fn close(&mut self) -> Result<(), SqlHandleError> {
        self.bindings.clear();
        Ok(())
    }
}
