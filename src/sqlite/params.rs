use rusqlite::types::Value;

use crate::coercion::TIMESTAMP_FORMAT;
use crate::driver::ParamBinding;
use crate::types::{RowValues, SqlType};

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a binding to the value `SQLite` receives. OUT registrations bind NULL.
#[must_use]
pub fn binding_to_sqlite_value(binding: &ParamBinding) -> Value {
    match binding {
        ParamBinding::Null | ParamBinding::Out(_) => Value::Null,
        ParamBinding::Generic(value) => row_value_to_sqlite_value(value),
        ParamBinding::Value { sql_type, value } | ParamBinding::InOut { sql_type, value } => {
            typed_value(*sql_type, value)
        }
    }
}

/// Honor the declared type where `SQLite`'s storage classes differ from the value's own.
fn typed_value(sql_type: SqlType, value: &RowValues) -> Value {
    match (sql_type, value) {
        #[allow(clippy::cast_possible_truncation)]
        (SqlType::Integer | SqlType::BigInt, RowValues::Float(f)) if f.is_finite() => {
            Value::Integer(f.trunc() as i64)
        }
        #[allow(clippy::cast_precision_loss)]
        (SqlType::Real | SqlType::Double, RowValues::Int(i)) => Value::Real(*i as f64),
        (SqlType::Text, RowValues::Int(i)) => Value::Text(i.to_string()),
        (SqlType::Text, RowValues::Float(f)) => Value::Text(f.to_string()),
        (SqlType::Timestamp, RowValues::Timestamp(ts)) => {
            Value::Text(ts.format(TIMESTAMP_FORMAT).to_string())
        }
        _ => row_value_to_sqlite_value(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_bindings_follow_declared_type() {
        let text = ParamBinding::InOut {
            sql_type: SqlType::Text,
            value: RowValues::Int(5),
        };
        assert_eq!(binding_to_sqlite_value(&text), Value::Text("5".into()));
        assert_eq!(
            binding_to_sqlite_value(&ParamBinding::Out(SqlType::Integer)),
            Value::Null
        );
        assert_eq!(
            binding_to_sqlite_value(&ParamBinding::Generic(RowValues::Bool(true))),
            Value::Integer(1)
        );
    }
}
