use std::borrow::Cow;
use std::fmt::Write;

use super::TIMESTAMP_FORMAT;
use crate::args::Arg;
use crate::placeholders::rewrite_placeholders;
use crate::types::RowValues;

/// Render `sql` with each `?` replaced by the textual form of the matching argument.
///
/// For logs only; statements are always executed with bound parameters. OUT markers and
/// placeholders without an argument keep their `?`.
///
/// ```rust
/// use sql_handles::prelude::*;
///
/// let text = format_statement("update t set name = ? where id = ?", &args!["o'neil", 3]);
/// assert_eq!(text, "update t set name = 'o''neil' where id = 3");
/// ```
#[must_use]
pub fn format_statement<'a>(sql: &'a str, args: &[Arg]) -> Cow<'a, str> {
    rewrite_placeholders(sql, |placeholder| {
        let position = match placeholder.number {
            Some(digits) => digits.parse::<usize>().ok()?,
            None => placeholder.ordinal,
        };
        let arg = args.get(position.checked_sub(1)?)?;
        arg.input_value().map(render_value)
    })
}

/// Textual SQL-ish form of a single value: strings quoted, timestamps as
/// `'YYYY-MM-DD HH:MM:SS'`, NULL as `null`.
#[must_use]
pub fn render_value(value: &RowValues) -> String {
    match value {
        RowValues::Null => "null".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => b.to_string(),
        RowValues::Text(s) => quote(s),
        RowValues::Timestamp(ts) => format!("'{}'", ts.format(TIMESTAMP_FORMAT)),
        RowValues::JSON(json) => quote(&json.to_string()),
        RowValues::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{InOutParam, OutParam};
    use crate::types::SqlType;
    use chrono::NaiveDate;

    #[test]
    fn renders_each_kind() {
        let ts = NaiveDate::from_ymd_opt(2023, 7, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .map(RowValues::Timestamp)
            .unwrap();
        let args = vec![
            Arg::from("x"),
            Arg::Value(ts),
            Arg::from(None::<i32>),
            Arg::from(1.5),
        ];
        let sql = "insert into t values (?, ?, ?, ?)";
        assert_eq!(
            format_statement(sql, &args),
            "insert into t values ('x', '2023-07-01 08:30:00', null, 1.5)"
        );
    }

    #[test]
    fn markers_and_missing_args() {
        let args = vec![
            Arg::from(InOutParam::new(SqlType::Integer, 5)),
            Arg::from(OutParam::new(SqlType::Integer)),
        ];
        assert_eq!(
            format_statement("call p(?, ?, ?)", &args),
            "call p(5, ?, ?)"
        );
    }

    #[test]
    fn quoted_question_marks_are_left_alone() {
        assert_eq!(
            format_statement("select '?' where a = ?", &[Arg::from(1)]),
            "select '?' where a = 1"
        );
        assert_eq!(render_value(&RowValues::Blob(vec![0xde, 0xad])), "X'DEAD'");
    }
}
