use chrono::{DateTime, NaiveDateTime};

use crate::types::RowValues;

/// Conversion from a column value that never fails.
///
/// Numeric and boolean shapes read NULL or unconvertible values as zero/`false`; reference shapes
/// (`Option<_>`) read them as `None`. Text holding a number or a timestamp is parsed.
pub trait FromColumn: Sized {
    fn from_column(value: &RowValues) -> Self;
}

fn parse_i64(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn as_i64(value: &RowValues) -> Option<i64> {
    match value {
        RowValues::Int(i) => Some(*i),
        RowValues::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        RowValues::Bool(b) => Some(i64::from(*b)),
        RowValues::Text(s) => parse_i64(s),
        _ => None,
    }
}

fn as_f64(value: &RowValues) -> Option<f64> {
    match value {
        RowValues::Float(f) => Some(*f),
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => Some(*i as f64),
        RowValues::Bool(b) => Some(f64::from(u8::from(*b))),
        RowValues::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FromColumn for i64 {
    fn from_column(value: &RowValues) -> Self {
        as_i64(value).unwrap_or(0)
    }
}

macro_rules! narrow_int_from_column {
    ($($t:ty),*) => {
        $(
            impl FromColumn for $t {
                fn from_column(value: &RowValues) -> Self {
                    as_i64(value).and_then(|i| <$t>::try_from(i).ok()).unwrap_or(0)
                }
            }
        )*
    };
}

narrow_int_from_column!(i32, i16, i8);

impl FromColumn for f64 {
    fn from_column(value: &RowValues) -> Self {
        as_f64(value).unwrap_or(0.0)
    }
}

impl FromColumn for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_column(value: &RowValues) -> Self {
        as_f64(value).map_or(0.0, |f| f as f32)
    }
}

impl FromColumn for bool {
    fn from_column(value: &RowValues) -> Self {
        match value {
            RowValues::Bool(b) => *b,
            RowValues::Int(i) => *i != 0,
            RowValues::Float(f) => *f != 0.0,
            RowValues::Text(s) => {
                let s = s.trim();
                ["true", "t", "yes", "y", "1"]
                    .iter()
                    .any(|candidate| s.eq_ignore_ascii_case(candidate))
            }
            _ => false,
        }
    }
}

impl FromColumn for Option<String> {
    fn from_column(value: &RowValues) -> Self {
        match value {
            RowValues::Null => None,
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Bool(b) => Some(b.to_string()),
            RowValues::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            RowValues::JSON(json) => Some(json.to_string()),
            RowValues::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl FromColumn for Option<NaiveDateTime> {
    fn from_column(value: &RowValues) -> Self {
        match value {
            RowValues::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
            other => other.as_timestamp(),
        }
    }
}

impl FromColumn for Option<Vec<u8>> {
    fn from_column(value: &RowValues) -> Self {
        match value {
            RowValues::Blob(bytes) => Some(bytes.clone()),
            RowValues::Text(s) => Some(s.clone().into_bytes()),
            _ => None,
        }
    }
}

impl FromColumn for Option<serde_json::Value> {
    fn from_column(value: &RowValues) -> Self {
        match value {
            RowValues::JSON(json) => Some(json.clone()),
            RowValues::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

impl FromColumn for RowValues {
    fn from_column(value: &RowValues) -> Self {
        value.clone()
    }
}
