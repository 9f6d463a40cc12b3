use crate::args::Arg;
use crate::driver::ParamBinding;
use crate::types::{RowValues, SqlType};

/// Map one argument to its driver binding.
///
/// Integers take the narrowest of `Integer`/`BigInt` that holds them, floats bind as `Double`,
/// text as `Text` and timestamps as `Timestamp`. Booleans, blobs and JSON are handed to the
/// driver's own conversion.
#[must_use]
pub fn bind_arg(arg: &Arg) -> ParamBinding {
    match arg {
        Arg::Value(value) => bind_value(value),
        Arg::Out(param) => ParamBinding::Out(param.sql_type()),
        Arg::InOut(param) => ParamBinding::InOut {
            sql_type: param.sql_type(),
            value: param.in_value().clone(),
        },
    }
}

/// Map an ordered argument list.
#[must_use]
pub fn bind_args(args: &[Arg]) -> Vec<ParamBinding> {
    args.iter().map(bind_arg).collect()
}

fn bind_value(value: &RowValues) -> ParamBinding {
    let sql_type = match value {
        RowValues::Null => return ParamBinding::Null,
        RowValues::Int(i) => {
            if i32::try_from(*i).is_ok() {
                SqlType::Integer
            } else {
                SqlType::BigInt
            }
        }
        RowValues::Float(_) => SqlType::Double,
        RowValues::Text(_) => SqlType::Text,
        RowValues::Timestamp(_) => SqlType::Timestamp,
        RowValues::Bool(_) | RowValues::JSON(_) | RowValues::Blob(_) => {
            return ParamBinding::Generic(value.clone());
        }
    };
    ParamBinding::Value {
        sql_type,
        value: value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{InOutParam, OutParam};

    #[test]
    fn integers_pick_narrowest_type() {
        assert_eq!(
            bind_arg(&Arg::from(7)),
            ParamBinding::Value {
                sql_type: SqlType::Integer,
                value: RowValues::Int(7)
            }
        );
        assert_eq!(
            bind_arg(&Arg::from(i64::from(i32::MAX) + 1)).sql_type(),
            Some(SqlType::BigInt)
        );
    }

    #[test]
    fn null_and_generic_values() {
        assert_eq!(bind_arg(&Arg::from(None::<i64>)), ParamBinding::Null);
        assert_eq!(
            bind_arg(&Arg::from(true)),
            ParamBinding::Generic(RowValues::Bool(true))
        );
        assert_eq!(bind_arg(&Arg::from(2.5)).sql_type(), Some(SqlType::Double));
    }

    #[test]
    fn markers_register_output() {
        let out = bind_arg(&Arg::from(OutParam::new(SqlType::Text)));
        assert_eq!(out, ParamBinding::Out(SqlType::Text));
        assert_eq!(out.value(), None);

        let inout = bind_arg(&Arg::from(InOutParam::new(SqlType::Integer, 5)));
        assert!(inout.is_output());
        assert_eq!(inout.value(), Some(&RowValues::Int(5)));
    }
}
