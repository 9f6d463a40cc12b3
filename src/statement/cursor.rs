use chrono::NaiveDateTime;

use crate::coercion::FromColumn;
use crate::results::{DbRow, ResultSet};
use crate::types::{ColumnRef, RowValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Position {
    #[default]
    Unopened,
    Row(usize),
    Exhausted,
}

/// Forward-only position over a materialized result.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    result: Option<ResultSet>,
    position: Position,
}

impl Cursor {
    pub(crate) fn load(&mut self, result: ResultSet) {
        self.result = Some(result);
        self.position = Position::Unopened;
    }

    pub(crate) fn clear(&mut self) {
        self.result = None;
        self.position = Position::Unopened;
    }

    /// Step to the next row; `false` at end of data or with no result.
    pub fn advance(&mut self) -> bool {
        let Some(result) = &self.result else {
            return false;
        };
        let next = match self.position {
            Position::Unopened => 0,
            Position::Row(idx) => idx + 1,
            Position::Exhausted => return false,
        };
        if next < result.len() {
            self.position = Position::Row(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&ResultSet> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn current_row(&self) -> Option<&DbRow> {
        match self.position {
            Position::Row(idx) => self.result.as_ref()?.results.get(idx),
            Position::Unopened | Position::Exhausted => None,
        }
    }

    /// Value in the current row; columns are 1-based or named.
    #[must_use]
    pub fn value(&self, column: ColumnRef<'_>) -> Option<&RowValues> {
        let row = self.current_row()?;
        match column {
            ColumnRef::Index(idx) => row.get_by_index(idx.checked_sub(1)?),
            ColumnRef::Name(name) => row.get(name),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&[String]> {
        self.result
            .as_ref()?
            .get_column_names()
            .map(|names| names.as_slice())
    }
}

/// Maps the current row to a value.
pub trait RowMapper {
    type Output;

    fn map_row(&self, row: &DbRow) -> Self::Output;
}

impl<F, T> RowMapper for F
where
    F: Fn(&DbRow) -> T,
{
    type Output = T;

    fn map_row(&self, row: &DbRow) -> T {
        self(row)
    }
}

/// Row iteration and typed column access.
///
/// Getters never fail. Before the first successful [`next`](ResultCursor::next), after the
/// last row, or for a missing column, numeric getters return zero and reference getters
/// return `None`.
pub trait ResultCursor {
    fn cursor(&self) -> &Cursor;

    fn cursor_mut(&mut self) -> &mut Cursor;

    fn next(&mut self) -> bool {
        self.cursor_mut().advance()
    }

    fn get<'c, T: FromColumn>(&self, column: impl Into<ColumnRef<'c>>) -> T
    where
        Self: Sized,
    {
        self.cursor()
            .value(column.into())
            .map_or_else(|| T::from_column(&RowValues::Null), T::from_column)
    }

    fn get_value<'c>(&self, column: impl Into<ColumnRef<'c>>) -> RowValues
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_int<'c>(&self, column: impl Into<ColumnRef<'c>>) -> i32
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_long<'c>(&self, column: impl Into<ColumnRef<'c>>) -> i64
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_short<'c>(&self, column: impl Into<ColumnRef<'c>>) -> i16
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_byte<'c>(&self, column: impl Into<ColumnRef<'c>>) -> i8
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_double<'c>(&self, column: impl Into<ColumnRef<'c>>) -> f64
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_float<'c>(&self, column: impl Into<ColumnRef<'c>>) -> f32
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_bool<'c>(&self, column: impl Into<ColumnRef<'c>>) -> bool
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_string<'c>(&self, column: impl Into<ColumnRef<'c>>) -> Option<String>
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_timestamp<'c>(&self, column: impl Into<ColumnRef<'c>>) -> Option<NaiveDateTime>
    where
        Self: Sized,
    {
        self.get(column)
    }

    fn get_bytes<'c>(&self, column: impl Into<ColumnRef<'c>>) -> Option<Vec<u8>>
    where
        Self: Sized,
    {
        self.get(column)
    }

    /// True for SQL NULL and for reads with no current row or column.
    fn is_null<'c>(&self, column: impl Into<ColumnRef<'c>>) -> bool
    where
        Self: Sized,
    {
        self.cursor()
            .value(column.into())
            .is_none_or(RowValues::is_null)
    }

    /// Every column of the current row as text, joined with `delimiter`; NULL renders as
    /// `null`. Empty without a current row.
    fn get_line(&self, delimiter: &str) -> String {
        let Some(row) = self.cursor().current_row() else {
            return String::new();
        };
        row.values
            .iter()
            .map(|v| Option::<String>::from_column(v).unwrap_or_else(|| "null".to_string()))
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// Every column of the current row double-quoted and comma separated. NULL renders as `""`.
    fn get_csv_line(&self) -> String {
        let Some(row) = self.cursor().current_row() else {
            return String::new();
        };
        row.values
            .iter()
            .map(|v| {
                let text = Option::<String>::from_column(v).unwrap_or_default();
                format!("\"{}\"", text.replace('"', "\"\""))
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Number of columns in the result, 0 when nothing was executed.
    fn column_count(&self) -> usize {
        self.cursor().column_names().map_or(0, <[String]>::len)
    }

    /// Name of the 1-based column `index`.
    fn column_name(&self, index: usize) -> Option<&str> {
        self.cursor()
            .column_names()?
            .get(index.checked_sub(1)?)
            .map(String::as_str)
    }

    fn column_names(&self) -> Vec<String> {
        self.cursor()
            .column_names()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    fn result_set(&self) -> Option<&ResultSet> {
        self.cursor().result()
    }

    /// Map the current row, if there is one.
    fn map_row<M: RowMapper>(&self, mapper: &M) -> Option<M::Output>
    where
        Self: Sized,
    {
        self.cursor().current_row().map(|row| mapper.map_row(row))
    }

    /// Advance through the remaining rows, mapping each.
    fn map_rows<M: RowMapper>(&mut self, mapper: M) -> Vec<M::Output>
    where
        Self: Sized,
    {
        let mut mapped = Vec::new();
        while self.next() {
            if let Some(value) = self.map_row(&mapper) {
                mapped.push(value);
            }
        }
        mapped
    }
}

impl ResultCursor for Cursor {
    fn cursor(&self) -> &Cursor {
        self
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        self
    }
}
