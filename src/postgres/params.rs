use std::error::Error;

use chrono::NaiveDateTime;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType};
use tokio_util::bytes::BytesMut;

use crate::driver::ParamBinding;
use crate::types::{RowValues, SqlType};

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// Encodes against the parameter type the server reported, so an `Int` can fill an `int2`,
/// `int4`, `int8`, `float*` or `text` slot.
impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => encode_int(*i, ty, out),
            RowValues::Float(f) => encode_float(*f, ty, out),
            RowValues::Text(s) => encode_text(s, ty, out),
            RowValues::Bool(b) => b.to_sql(ty, out),
            RowValues::Timestamp(dt) => dt.to_sql(ty, out),
            RowValues::JSON(value) => match *ty {
                Type::TEXT | Type::VARCHAR => value.to_string().to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    /// NULL fits a slot of any type.
    fn to_sql_checked(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        if !<Self as ToSql>::accepts(ty) {
            return Err(Box::new(WrongType::new::<Self>(ty.clone())));
        }
        self.to_sql(ty, out)
    }
}

fn encode_int(value: i64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::BOOL => (value != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            value.to_string().to_sql(ty, out)
        }
        _ => value.to_sql(ty, out),
    }
}

fn encode_float(value: f64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        #[allow(clippy::cast_possible_truncation)]
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            value.to_string().to_sql(ty, out)
        }
        _ => value.to_sql(ty, out),
    }
}

fn encode_text(value: &str, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => encode_int(value.trim().parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => encode_float(value.trim().parse()?, ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ => {
            let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")?;
            parsed.to_sql(ty, out)
        }
        Type::JSON | Type::JSONB => {
            serde_json::from_str::<serde_json::Value>(value)?.to_sql(ty, out)
        }
        _ => value.to_sql(ty, out),
    }
}

/// The value sent for a binding. OUT registrations send NULL.
#[must_use]
pub(super) fn binding_to_postgres_value(binding: &ParamBinding) -> RowValues {
    match binding {
        ParamBinding::Null | ParamBinding::Out(_) => RowValues::Null,
        ParamBinding::Generic(value) => value.clone(),
        ParamBinding::Value { sql_type, value } | ParamBinding::InOut { sql_type, value } => {
            typed_value(*sql_type, value)
        }
    }
}

fn typed_value(sql_type: SqlType, value: &RowValues) -> RowValues {
    match (sql_type, value) {
        (SqlType::Text, RowValues::Int(i)) => RowValues::Text(i.to_string()),
        (SqlType::Text, RowValues::Float(f)) => RowValues::Text(f.to_string()),
        #[allow(clippy::cast_precision_loss)]
        (SqlType::Real | SqlType::Double, RowValues::Int(i)) => RowValues::Float(*i as f64),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_narrows_to_declared_column_type() {
        let mut buf = BytesMut::new();
        RowValues::Int(7)
            .to_sql_checked(&Type::INT4, &mut buf)
            .expect("fits int4");
        assert_eq!(buf.len(), 4);

        let mut buf = BytesMut::new();
        assert!(
            RowValues::Int(i64::from(i32::MAX) + 1)
                .to_sql_checked(&Type::INT4, &mut buf)
                .is_err()
        );
    }

    #[test]
    fn null_accepts_any_type() {
        let mut buf = BytesMut::new();
        let is_null = RowValues::Null
            .to_sql_checked(&Type::NUMERIC, &mut buf)
            .expect("null encodes");
        assert!(matches!(is_null, IsNull::Yes));
        assert!(
            RowValues::Int(1)
                .to_sql_checked(&Type::NUMERIC, &mut buf)
                .is_err()
        );
    }

    #[test]
    fn out_bindings_send_null() {
        assert_eq!(
            binding_to_postgres_value(&ParamBinding::Out(SqlType::Integer)),
            RowValues::Null
        );
        assert_eq!(
            binding_to_postgres_value(&ParamBinding::InOut {
                sql_type: SqlType::Text,
                value: RowValues::Int(3),
            }),
            RowValues::Text("3".into())
        );
    }
}
