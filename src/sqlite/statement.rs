use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::types::Value;
use tracing::debug;

use super::connection::{Checkout, run_blocking};
use super::params::binding_to_sqlite_value;
use super::query::build_result_set;
use crate::driver::{CallOutcome, DriverOutcome, DriverStatement, ParamBinding, StatementKind};
use crate::error::SqlHandleError;
use crate::results::ResultSet;
use crate::types::RowValues;

static INSERT_TARGET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*(?:insert|replace)\s+(?:or\s+\w+\s+)?into\s+((?:"[^"]+"|`[^`]+`|\[[^\]]+\]|[\w$]+)(?:\s*\.\s*(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|[\w$]+))?)"#,
    )
    .ok()
});

/// Prepared `SQLite` statement.
///
/// `rusqlite` statements borrow their connection, so this keeps the SQL and its bindings and
/// re-fetches the compiled statement from the connection's statement cache on each execution.
pub struct SqliteStatement {
    conn: Arc<Checkout>,
    sql: Arc<str>,
    kind: StatementKind,
    param_count: usize,
    bindings: BTreeMap<usize, ParamBinding>,
}

impl SqliteStatement {
    pub(super) async fn prepare(
        conn: Arc<Checkout>,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Self, SqlHandleError> {
        let sql: Arc<str> = Arc::from(sql);
        let compile = Arc::clone(&sql);
        let param_count = run_blocking(conn.handle(), move |guard| {
            let stmt = guard.prepare_cached(&compile)?;
            Ok(stmt.parameter_count())
        })
        .await?;
        debug!(?kind, param_count, "prepared sqlite statement");
        Ok(Self {
            conn,
            sql,
            kind,
            param_count,
            bindings: BTreeMap::new(),
        })
    }

    fn bound_values(&self) -> Result<Vec<Value>, SqlHandleError> {
        (1..=self.param_count)
            .map(|idx| {
                self.bindings
                    .get(&idx)
                    .map(binding_to_sqlite_value)
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
impl DriverStatement for SqliteStatement {
    /// OUT markers past the last placeholder are accepted and receive values from the
    /// result row of a callable statement.
    fn bind(&mut self, index: usize, binding: ParamBinding) -> Result<(), SqlHandleError> {
        let trailing_output = index > self.param_count && matches!(binding, ParamBinding::Out(_));
        if index == 0 || (index > self.param_count && !trailing_output) {
            return Err(SqlHandleError::ParameterError(format!(
                "Parameter index {index} out of range (statement has {} placeholders)",
                self.param_count
            )));
        }
        self.bindings.insert(index, binding);
        Ok(())
    }

    async fn execute(&mut self) -> Result<DriverOutcome, SqlHandleError> {
        let values = self.bound_values()?;
        let outputs = self.bindings.values().filter(|b| b.is_output()).count();
        let sql = Arc::clone(&self.sql);
        let kind = self.kind;
        run_blocking(self.conn.handle(), move |guard| {
            execute_bound(guard, &sql, kind, &values, outputs)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), SqlHandleError> {
        self.bindings.clear();
        Ok(())
    }
}

fn execute_bound(
    conn: &rusqlite::Connection,
    sql: &str,
    kind: StatementKind,
    values: &[Value],
    outputs: usize,
) -> Result<DriverOutcome, SqlHandleError> {
    let mut stmt = conn.prepare_cached(sql)?;
    for (idx, value) in values.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value)?;
    }
    let returns_rows = stmt.column_count() > 0;

    match kind {
        StatementKind::Query => Ok(DriverOutcome::Rows(build_result_set(&mut stmt)?)),
        StatementKind::Update | StatementKind::Insert if returns_rows => {
            // INSERT ... RETURNING: the first returned column is taken as the generated key
            let rs = build_result_set(&mut stmt)?;
            let generated_key = if kind == StatementKind::Insert {
                first_value(&rs).and_then(|v| v.as_int().copied())
            } else {
                None
            };
            Ok(DriverOutcome::RowsAffected {
                count: rs.len(),
                generated_key,
            })
        }
        StatementKind::Update | StatementKind::Insert => {
            let count = stmt.raw_execute()?;
            let generated_key = if kind == StatementKind::Insert
                && count > 0
                && has_rowid_alias(conn, sql)?
            {
                Some(conn.last_insert_rowid())
            } else {
                None
            };
            Ok(DriverOutcome::RowsAffected {
                count,
                generated_key,
            })
        }
        StatementKind::Call if returns_rows => {
            let rs = build_result_set(&mut stmt)?;
            let out_values = (0..outputs)
                .map(|idx| {
                    rs.results
                        .first()
                        .and_then(|row| row.get_by_index(idx))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect();
            Ok(DriverOutcome::Call(CallOutcome {
                result_set: Some(rs),
                update_count: None,
                out_values,
            }))
        }
        StatementKind::Call => {
            let count = stmt.raw_execute()?;
            Ok(DriverOutcome::Call(CallOutcome {
                result_set: None,
                update_count: Some(count),
                out_values: vec![RowValues::Null; outputs],
            }))
        }
    }
}

fn first_value(rs: &ResultSet) -> Option<&RowValues> {
    rs.results.first().and_then(|row| row.get_by_index(0))
}

/// Name of the table an INSERT/REPLACE writes to, unquoted and without its schema.
fn insert_target(sql: &str) -> Option<String> {
    let re = INSERT_TARGET.as_ref()?;
    let qualified = re.captures(sql)?.get(1)?.as_str();
    let name = qualified.rsplit('.').next()?.trim();
    let unquoted = name
        .trim_start_matches(['"', '`', '['])
        .trim_end_matches(['"', '`', ']']);
    Some(unquoted.to_string())
}

/// True when the target table's primary key is a single `INTEGER` column, which `SQLite`
/// makes an alias for the rowid.
fn has_rowid_alias(conn: &rusqlite::Connection, sql: &str) -> Result<bool, SqlHandleError> {
    let Some(table) = insert_target(sql) else {
        return Ok(false);
    };
    let mut stmt = conn.prepare_cached("SELECT type, pk FROM pragma_table_info(?1)")?;
    let mut rows = stmt.query([&table])?;
    let mut pk_types = Vec::new();
    while let Some(row) = rows.next()? {
        let pk: i64 = row.get(1)?;
        if pk > 0 {
            pk_types.push(row.get::<_, String>(0)?);
        }
    }
    Ok(pk_types.len() == 1 && pk_types[0].eq_ignore_ascii_case("INTEGER"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_insert_target() {
        assert_eq!(
            insert_target("INSERT INTO users (name) VALUES (?)").as_deref(),
            Some("users")
        );
        assert_eq!(
            insert_target("insert or replace into main.\"Order Items\" values (?)").as_deref(),
            Some("Order Items")
        );
        assert_eq!(
            insert_target("  replace into [t1](a) values (1)").as_deref(),
            Some("t1")
        );
        assert_eq!(insert_target("update t set a = 1"), None);
    }

    #[test]
    fn rowid_alias_detection() -> Result<(), Box<dyn std::error::Error>> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE with_id (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);
             CREATE TABLE text_key (code TEXT PRIMARY KEY, v TEXT);
             CREATE TABLE no_key (v TEXT);",
        )?;
        assert!(has_rowid_alias(&conn, "insert into with_id (v) values (?)")?);
        assert!(!has_rowid_alias(&conn, "insert into text_key values (?, ?)")?);
        assert!(!has_rowid_alias(&conn, "insert into no_key values (?)")?);
        Ok(())
    }
}
