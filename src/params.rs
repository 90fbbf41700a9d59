//! Parameter translation between the caller's binding conventions and the
//! driver's.
//!
//! Callers may bind positionally with `?` or by name with `%(name)s`
//! (`pyformat`). Positional statements are rewritten so every `?` becomes a
//! distinct `%(param_N)s`; drivers then see a single, named convention and turn
//! it into PostgreSQL's `$N` with [`compile_named`].
//!
//! Placeholders are only recognized in SQL code: string literals, quoted
//! identifiers, comments and dollar-quoted bodies pass through untouched.

use std::collections::HashMap;

use crate::error::{PgBridgeError, Result};
use crate::types::{NamedParams, SqlValue};

/// The ordinal placeholder accepted in positional statements.
pub const POSITIONAL_PLACEHOLDER: u8 = b'?';

/// A caller-supplied parameter set.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Parameters {
    #[default]
    None,
    Positional(Vec<SqlValue>),
    Named(NamedParams),
}

impl From<()> for Parameters {
    fn from(_: ()) -> Self {
        Parameters::None
    }
}

impl From<Vec<SqlValue>> for Parameters {
    fn from(values: Vec<SqlValue>) -> Self {
        Parameters::Positional(values)
    }
}

impl From<&[SqlValue]> for Parameters {
    fn from(values: &[SqlValue]) -> Self {
        Parameters::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[SqlValue; N]> for Parameters {
    fn from(values: [SqlValue; N]) -> Self {
        Parameters::Positional(values.to_vec())
    }
}

impl From<NamedParams> for Parameters {
    fn from(params: NamedParams) -> Self {
        Parameters::Named(params)
    }
}

impl<P: Into<Parameters>> From<Option<P>> for Parameters {
    fn from(params: Option<P>) -> Self {
        params.map_or(Parameters::None, Into::into)
    }
}

/// A statement and its parameters in the named convention.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: NamedParams,
}

/// Name given to the `index`-th positional parameter.
pub fn param_name(index: usize) -> String {
    format!("param_{index}")
}

/// Brings a statement and its parameters into the named convention.
pub fn bind(statement: &str, parameters: Parameters) -> BoundStatement {
    match parameters {
        Parameters::None => BoundStatement {
            sql: statement.to_string(),
            params: NamedParams::new(),
        },
        Parameters::Positional(values) => BoundStatement {
            sql: rewrite_positional(statement, values.len()),
            params: values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (param_name(i), v))
                .collect(),
        },
        Parameters::Named(params) => BoundStatement {
            sql: statement.to_string(),
            params,
        },
    }
}

/// Rewrites the first `count` occurrences of `?`, left to right, into
/// `%(param_0)s`, `%(param_1)s`, ...
///
/// Each occurrence gets its own name even though the markers are identical,
/// so the n-th marker binds the n-th value.
pub fn rewrite_positional(sql: &str, count: usize) -> String {
    if count == 0 {
        return sql.to_string();
    }
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + count * 12);
    let mut next = 0;
    let mut copied = 0;
    let mut idx = 0;
    while idx < bytes.len() && next < count {
        if let Some(end) = skip_non_code(bytes, idx) {
            idx = end;
            continue;
        }
        if bytes[idx] == POSITIONAL_PLACEHOLDER {
            out.push_str(&sql[copied..idx]);
            out.push_str("%(");
            out.push_str(&param_name(next));
            out.push_str(")s");
            next += 1;
            copied = idx + 1;
        }
        idx += 1;
    }
    out.push_str(&sql[copied..]);
    out
}

/// Compiles a `pyformat` statement into PostgreSQL's `$N` style.
///
/// Returns the rewritten SQL and the values in `$N` order. A name used more
/// than once keeps its first number; `%%` becomes a literal `%`.
///
/// # Errors
/// Returns [`PgBridgeError::Parameter`] if a placeholder is malformed or names
/// a parameter that was not supplied.
pub fn compile_named(sql: &str, params: &NamedParams) -> Result<(String, Vec<SqlValue>)> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut numbers: HashMap<&str, usize> = HashMap::new();
    let mut copied = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        if let Some(end) = skip_non_code(bytes, idx) {
            idx = end;
            continue;
        }
        if bytes[idx] != b'%' {
            idx += 1;
            continue;
        }
        match bytes.get(idx + 1) {
            Some(b'%') => {
                out.push_str(&sql[copied..idx]);
                out.push('%');
                idx += 2;
                copied = idx;
            }
            Some(b'(') => {
                let close = sql[idx + 2..]
                    .find(')')
                    .map(|off| idx + 2 + off)
                    .filter(|&close| bytes.get(close + 1) == Some(&b's'))
                    .ok_or_else(|| {
                        PgBridgeError::Parameter(format!(
                            "malformed placeholder at byte {idx}"
                        ))
                    })?;
                let name = &sql[idx + 2..close];
                let number = match numbers.get(name) {
                    Some(&n) => n,
                    None => {
                        let value = params.get(name).ok_or_else(|| {
                            PgBridgeError::Parameter(format!("missing parameter: {name}"))
                        })?;
                        values.push(value.clone());
                        numbers.insert(name, values.len());
                        values.len()
                    }
                };
                out.push_str(&sql[copied..idx]);
                out.push('$');
                out.push_str(&number.to_string());
                idx = close + 2;
                copied = idx;
            }
            _ => idx += 1,
        }
    }
    out.push_str(&sql[copied..]);
    Ok((out, values))
}

/// If a literal, quoted identifier, comment or dollar-quoted body starts at
/// `idx`, returns the index just past its end.
fn skip_non_code(bytes: &[u8], idx: usize) -> Option<usize> {
    match bytes[idx] {
        b'\'' if is_escape_string(bytes, idx) => Some(skip_escape_string(bytes, idx)),
        b'\'' => Some(skip_quoted(bytes, idx, b'\'')),
        b'"' => Some(skip_quoted(bytes, idx, b'"')),
        b'-' if bytes.get(idx + 1) == Some(&b'-') => Some(
            bytes[idx..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(bytes.len(), |off| idx + off + 1),
        ),
        b'/' if bytes.get(idx + 1) == Some(&b'*') => Some(skip_block_comment(bytes, idx)),
        b'$' => dollar_tag(bytes, idx).map(|tag| skip_dollar_quoted(bytes, idx, tag)),
        _ => None,
    }
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut idx = start + 1;
    while idx < bytes.len() {
        if bytes[idx] == quote {
            // doubled quote is an escaped quote
            if bytes.get(idx + 1) == Some(&quote) {
                idx += 2;
                continue;
            }
            return idx + 1;
        }
        idx += 1;
    }
    bytes.len()
}

/// Whether the quote at `idx` opens an `E'...'` literal.
fn is_escape_string(bytes: &[u8], idx: usize) -> bool {
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    match idx {
        0 => false,
        1 => matches!(bytes[0], b'E' | b'e'),
        _ => matches!(bytes[idx - 1], b'E' | b'e') && !is_word(bytes[idx - 2]),
    }
}

/// Like [`skip_quoted`], but a backslash escapes the next byte.
fn skip_escape_string(bytes: &[u8], start: usize) -> usize {
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'\'' if bytes.get(idx + 1) == Some(&b'\'') => idx += 2,
            b'\'' => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut idx = start;
    while idx + 1 < bytes.len() {
        match (bytes[idx], bytes[idx + 1]) {
            (b'/', b'*') => {
                depth += 1;
                idx += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                idx += 2;
                if depth == 0 {
                    return idx;
                }
            }
            _ => idx += 1,
        }
    }
    bytes.len()
}

/// Length of the `$tag$` opener at `idx`, if there is one. `$1` is not a tag.
fn dollar_tag(bytes: &[u8], idx: usize) -> Option<usize> {
    let mut end = idx + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        if end == idx + 1 && bytes[end].is_ascii_digit() {
            return None;
        }
        end += 1;
    }
    (bytes.get(end) == Some(&b'$')).then_some(end + 1 - idx)
}

fn skip_dollar_quoted(bytes: &[u8], start: usize, tag_len: usize) -> usize {
    let tag = &bytes[start..start + tag_len];
    let body = start + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|w| w == tag)
        .map_or(bytes.len(), |off| body + off + tag_len)
}
