use std::borrow::Cow;

use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    scan_digits, try_start_dollar_quote,
};

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A `?` marker found in executable SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// 1-based position among the markers seen so far.
    pub ordinal: usize,
    /// Digits following the `?`, for the numbered `?N` form.
    pub number: Option<&'a str>,
}

/// Walk `sql`, calling `replace` for each placeholder outside literals, identifiers, comments and
/// dollar-quoted bodies. Returning `None` keeps the original marker text.
///
/// Returns a borrowed `Cow` when nothing was replaced.
pub(crate) fn rewrite_placeholders<'s, F>(sql: &'s str, mut replace: F) -> Cow<'s, str>
where
    F: FnMut(Placeholder<'_>) -> Option<String>,
{
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut ordinal = 0;
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    }
                }
                b'?' => {
                    ordinal += 1;
                    let (end, number) = match scan_digits(bytes, idx + 1) {
                        Some((end, digits)) => (end, Some(digits)),
                        None => (idx + 1, None),
                    };
                    if let Some(text) = replace(Placeholder { ordinal, number }) {
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 16));
                        buf.push_str(&sql[copied_to..idx]);
                        buf.push_str(&text);
                        copied_to = end;
                    }
                    idx = end - 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}
