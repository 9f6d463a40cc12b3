//! Statement arguments.
//!
//! Arguments are plain values or OUT/INOUT markers for procedure calls. Native Rust values
//! convert through `From`, so most callers build argument lists with [`args!`](crate::args!).

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value as JsonValue;

use crate::coercion::FromColumn;
use crate::types::{RowValues, SqlType};

/// One positional statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(RowValues),
    Out(OutParam),
    InOut(InOutParam),
}

impl Arg {
    /// The value sent to the driver, if any. OUT markers carry none.
    #[must_use]
    pub fn input_value(&self) -> Option<&RowValues> {
        match self {
            Arg::Value(value) => Some(value),
            Arg::Out(_) => None,
            Arg::InOut(param) => Some(param.in_value()),
        }
    }

    /// Where the driver's output value goes, for OUT and INOUT markers.
    pub(crate) fn output_slot(&self) -> Option<&OutputSlot> {
        match self {
            Arg::Value(_) => None,
            Arg::Out(param) => Some(&param.slot),
            Arg::InOut(param) => Some(&param.slot),
        }
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        !matches!(self, Arg::Value(_))
    }
}

/// Shared, mutable holder for a value received from a procedure call.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputSlot(Arc<Mutex<RowValues>>);

impl OutputSlot {
    pub(crate) fn set(&self, value: RowValues) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub(crate) fn get(&self) -> RowValues {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PartialEq for OutputSlot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Typed access to the value a procedure call wrote into an OUT or INOUT marker.
///
/// Reads never fail: before execution, or when the procedure produced NULL, numeric getters
/// return zero and reference getters return `None`.
pub trait OutputValue {
    /// Snapshot of the received value; `RowValues::Null` until the call has run.
    fn output_value(&self) -> RowValues;

    fn get<T: FromColumn>(&self) -> T
    where
        Self: Sized,
    {
        T::from_column(&self.output_value())
    }

    fn get_int(&self) -> i32 {
        i32::from_column(&self.output_value())
    }

    fn get_long(&self) -> i64 {
        i64::from_column(&self.output_value())
    }

    fn get_short(&self) -> i16 {
        i16::from_column(&self.output_value())
    }

    fn get_double(&self) -> f64 {
        f64::from_column(&self.output_value())
    }

    fn get_float(&self) -> f32 {
        f32::from_column(&self.output_value())
    }

    fn get_bool(&self) -> bool {
        bool::from_column(&self.output_value())
    }

    fn get_string(&self) -> Option<String> {
        Option::<String>::from_column(&self.output_value())
    }

    fn get_timestamp(&self) -> Option<NaiveDateTime> {
        Option::<NaiveDateTime>::from_column(&self.output_value())
    }

    fn is_null(&self) -> bool {
        self.output_value().is_null()
    }
}

/// Output-only procedure parameter.
///
/// Clones share one output slot: keep a clone, pass another in the argument list, and read
/// the received value from the kept one after `execute()`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutParam {
    sql_type: SqlType,
    slot: OutputSlot,
}

impl OutParam {
    #[must_use]
    pub fn new(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            slot: OutputSlot::default(),
        }
    }

    #[must_use]
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}

impl OutputValue for OutParam {
    fn output_value(&self) -> RowValues {
        self.slot.get()
    }
}

/// Input/output procedure parameter: binds `in_value` and receives a value back.
#[derive(Debug, Clone, PartialEq)]
pub struct InOutParam {
    sql_type: SqlType,
    in_value: RowValues,
    slot: OutputSlot,
}

impl InOutParam {
    pub fn new(sql_type: SqlType, in_value: impl Into<RowValues>) -> Self {
        Self {
            sql_type,
            in_value: in_value.into(),
            slot: OutputSlot::default(),
        }
    }

    #[must_use]
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    #[must_use]
    pub fn in_value(&self) -> &RowValues {
        &self.in_value
    }
}

impl OutputValue for InOutParam {
    fn output_value(&self) -> RowValues {
        self.slot.get()
    }
}

/// Build a `Vec<Arg>` from heterogeneous values.
///
/// ```rust
/// use sql_handles::prelude::*;
///
/// let total = OutParam::new(SqlType::BigInt);
/// let list = args![5, "alice", None::<i32>, &total];
/// assert_eq!(list.len(), 4);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::args::Arg>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::args::Arg::from($value)),+]
    };
}

macro_rules! int_into_row_values {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RowValues {
                fn from(value: $t) -> Self {
                    RowValues::Int(i64::from(value))
                }
            }
        )*
    };
}

int_into_row_values!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&String> for RowValues {
    fn from(value: &String) -> Self {
        RowValues::Text(value.clone())
    }
}

impl From<char> for RowValues {
    fn from(value: char) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Timestamp(value.and_time(NaiveTime::MIN))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for RowValues {
    fn from(value: DateTime<Tz>) -> Self {
        RowValues::Timestamp(value.naive_local())
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<&[u8]> for RowValues {
    fn from(value: &[u8]) -> Self {
        RowValues::Blob(value.to_vec())
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

macro_rules! value_into_arg {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(value: $t) -> Self {
                    Arg::Value(value.into())
                }
            }
        )*
    };
}

value_into_arg!(
    RowValues, i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, &String, char,
    NaiveDateTime, NaiveDate, Vec<u8>, &[u8], JsonValue
);

impl<Tz: TimeZone> From<DateTime<Tz>> for Arg {
    fn from(value: DateTime<Tz>) -> Self {
        Arg::Value(value.into())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Arg::Value(value.into())
    }
}

impl From<OutParam> for Arg {
    fn from(param: OutParam) -> Self {
        Arg::Out(param)
    }
}

impl From<&OutParam> for Arg {
    fn from(param: &OutParam) -> Self {
        Arg::Out(param.clone())
    }
}

impl From<InOutParam> for Arg {
    fn from(param: InOutParam) -> Self {
        Arg::InOut(param)
    }
}

impl From<&InOutParam> for Arg {
    fn from(param: &InOutParam) -> Self {
        Arg::InOut(param.clone())
    }
}
