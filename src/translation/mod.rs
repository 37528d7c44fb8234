use std::borrow::Cow;

mod scanner;

use scanner::{
    State, closes_quote, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    matches_tag, scan_digits, try_start_dollar_quote,
};

/// Native positional marker a driver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style numbered placeholders like `?1`.
    Sqlite,
}

/// Rewrite the portable `?` placeholder to the driver's native marker.
///
/// Explicitly numbered `?N` (and `$N` when targeting SQLite) keep their number.
/// A bare `?` takes one more than the largest number assigned before it, as
/// SQLite numbers them, so `?2, ?` becomes `?2, ?3`. Quoted strings, quoted
/// identifiers, comments and dollar-quoted blocks are left untouched by a small
/// state machine:
/// ```rust
/// use sql_scope::prelude::*;
///
/// let sql = translate_placeholders(
///     "select * from t where id = ? and note <> '?'",
///     PlaceholderStyle::Postgres,
/// );
/// assert_eq!(sql, "select * from t where id = $1 and note <> '?'");
/// ```
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut state = State::Normal;
    let mut highest = 0usize;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        let start = idx;
        let mut replacement: Option<String> = None;
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backticked,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    } else if let Some((digits_end, digits)) = scan_digits(bytes, idx + 1) {
                        highest = highest.max(digits.parse().unwrap_or(0));
                        if target == PlaceholderStyle::Sqlite {
                            replacement = Some(format!("?{digits}"));
                        }
                        idx = digits_end - 1;
                    }
                }
                b'?' => {
                    let marker = match scan_digits(bytes, idx + 1) {
                        Some((digits_end, digits)) => {
                            idx = digits_end - 1;
                            highest = highest.max(digits.parse().unwrap_or(0));
                            digits.to_string()
                        }
                        None => {
                            highest += 1;
                            highest.to_string()
                        }
                    };
                    replacement = Some(match target {
                        PlaceholderStyle::Postgres => format!("${marker}"),
                        PlaceholderStyle::Sqlite => format!("?{marker}"),
                    });
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if b == quote {
                    let (closed, at) = closes_quote(bytes, idx, quote);
                    idx = at;
                    if closed {
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
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }

        if let Some(marker) = replacement {
            let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
            buf.push_str(&sql[copied..start]);
            buf.push_str(&marker);
            copied = idx + 1;
        }

        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            if buf == sql {
                Cow::Borrowed(sql)
            } else {
                Cow::Owned(buf)
            }
        }
        None => Cow::Borrowed(sql),
    }
}
