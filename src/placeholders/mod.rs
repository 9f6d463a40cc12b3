//! Placeholder scanning for `?`-style SQL.
//!
//! Statements are written with JDBC-style `?` markers. The scanner skips quoted strings,
//! quoted identifiers, comments and dollar-quoted blocks, so a `?` inside any of those is left
//! alone.

use std::borrow::Cow;

mod parsers;
mod scanner;

pub(crate) use scanner::rewrite_placeholders;
pub use scanner::Placeholder;

/// Rewrite `?` markers into PostgreSQL's numbered `$N` form.
///
/// Bare markers are numbered in order of appearance; `?N` keeps its explicit number.
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn to_numbered(sql: &str) -> Cow<'_, str> {
    rewrite_placeholders(sql, |p| match p.number {
        Some(digits) => Some(format!("${digits}")),
        None => Some(format!("${}", p.ordinal)),
    })
}

/// Number of placeholder markers in executable SQL text.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let _ = rewrite_placeholders(sql, |_| {
        count += 1;
        None
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_bare_markers() {
        let sql = "select * from t where a = ? and b = ?";
        assert_eq!(to_numbered(sql), "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn keeps_explicit_numbers() {
        let sql = "insert into t values(?2, ?1)";
        assert_eq!(to_numbered(sql), "insert into t values($2, $1)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?', \"a?\", ? -- ?\n/* ? /* ? */ ? */ from t where a = ?";
        assert_eq!(
            to_numbered(sql),
            "select '?', \"a?\", $1 -- ?\n/* ? /* ? */ ? */ from t where a = $2"
        );
        assert_eq!(count_placeholders(sql), 2);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select ? from t $foo$ where a = ?";
        assert_eq!(to_numbered(sql), "$foo$ select ? from t $foo$ where a = $1");
    }

    #[test]
    fn escaped_quotes_and_multibyte_text_survive() {
        let sql = "select 'it''s ?', 'héllo' where x = ?";
        assert_eq!(to_numbered(sql), "select 'it''s ?', 'héllo' where x = $1");
    }

    #[test]
    fn unchanged_sql_is_borrowed() {
        let sql = "select 1";
        assert!(matches!(to_numbered(sql), Cow::Borrowed(_)));
    }
}
