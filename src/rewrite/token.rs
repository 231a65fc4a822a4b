//! Quote- and paren-aware tokenizing helpers for statement analysis
//!
//! The analysis layer only needs to locate column references and literals,
//! so these helpers implement exactly that: top-level splitting that skips
//! single-quoted strings and parenthesized groups, SQL literal parsing, and
//! identifier scanning.

use crate::value::SqlValue;

/// Boolean connector between WHERE conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Split on a delimiter at paren depth zero, outside string literals
///
/// Parts are returned trimmed; empty input yields no parts.
pub fn split_top_level(input: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\'' {
                // Doubled quote is an escaped quote, not a terminator.
                if chars.peek() == Some(&'\'') {
                    current.push(chars.next().unwrap());
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            _ if c == delimiter && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Split a WHERE clause into conditions with their leading connectors
///
/// Connectors are recognized as whole words (`AND`/`OR`, any case) at paren
/// depth zero, outside string literals. The first condition has no
/// connector. The `AND` inside a `BETWEEN low AND high` belongs to the
/// condition and does not split.
pub fn split_where_conditions(input: &str) -> Vec<(Option<Connector>, String)> {
    let mut out: Vec<(Option<Connector>, String)> = Vec::new();
    let mut current = String::new();
    let mut pending: Option<Connector> = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_between = false;

    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            current.push(c);
            if c == '\'' {
                if chars.get(i + 1) == Some(&'\'') {
                    current.push('\'');
                    i += 1;
                } else {
                    in_string = false;
                }
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
                i += 1;
            }
            '(' => {
                depth += 1;
                current.push(c);
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
                i += 1;
            }
            _ if depth == 0 => {
                if let Some(len) = keyword_at(&chars, i, "BETWEEN") {
                    in_between = true;
                    current.extend(&chars[i..i + len]);
                    i += len;
                } else if let Some((connector, len)) = connector_at(&chars, i) {
                    if in_between && connector == Connector::And {
                        in_between = false;
                        current.extend(&chars[i..i + len]);
                        i += len;
                    } else {
                        if !current.trim().is_empty() {
                            out.push((pending, current.trim().to_string()));
                            current.clear();
                        }
                        pending = Some(connector);
                        in_between = false;
                        i += len;
                    }
                } else {
                    current.push(c);
                    i += 1;
                }
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.trim().is_empty() {
        out.push((pending, current.trim().to_string()));
    }
    out
}

/// Match a whole keyword (case-insensitive) starting at position `i`
fn keyword_at(chars: &[char], i: usize, word: &str) -> Option<usize> {
    let word_boundary_before = i == 0 || !is_ident_char(chars[i - 1]);
    if !word_boundary_before {
        return None;
    }
    let len = word.len();
    if i + len <= chars.len()
        && chars[i..i + len]
            .iter()
            .zip(word.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
    {
        let boundary_after = i + len == chars.len() || !is_ident_char(chars[i + len]);
        if boundary_after {
            return Some(len);
        }
    }
    None
}

/// Match a whole-word AND/OR connector starting at position `i`
fn connector_at(chars: &[char], i: usize) -> Option<(Connector, usize)> {
    let word_boundary_before = i == 0 || !is_ident_char(chars[i - 1]);
    if !word_boundary_before {
        return None;
    }
    for (word, connector) in [("AND", Connector::And), ("OR", Connector::Or)] {
        let len = word.len();
        if i + len <= chars.len()
            && chars[i..i + len]
                .iter()
                .zip(word.chars())
                .all(|(a, b)| a.eq_ignore_ascii_case(&b))
        {
            let boundary_after =
                i + len == chars.len() || !is_ident_char(chars[i + len]);
            if boundary_after {
                return Some((connector, len));
            }
        }
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether a token is a bare column/table identifier
pub fn is_bare_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(is_ident_char)
}

/// Whether a token is the `?` parameter placeholder
pub fn is_placeholder(token: &str) -> bool {
    token.trim() == "?"
}

/// Parse a SQL literal token into a value, if it is one
///
/// Recognizes NULL, integers, floats, single-quoted strings (with doubled
/// quotes as escapes), and `x'..'` hex blobs. Anything else — column
/// references, expressions, function calls — yields `None`.
pub fn parse_literal(token: &str) -> Option<SqlValue> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("null") {
        return Some(SqlValue::Null);
    }
    if let Ok(v) = token.parse::<i64>() {
        return Some(SqlValue::Integer(v));
    }
    if let Ok(v) = token.parse::<f64>() {
        // Reject identifiers like `nan` that f64::parse would accept.
        if token
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
            .unwrap_or(false)
        {
            return Some(SqlValue::Real(v));
        }
    }
    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        let inner = &token[1..token.len() - 1];
        // A lone quote inside means the token is not one complete literal.
        let unescaped = inner.replace("''", "\u{0}");
        if unescaped.contains('\'') {
            return None;
        }
        return Some(SqlValue::Text(unescaped.replace('\u{0}', "'")));
    }
    if (token.starts_with("x'") || token.starts_with("X'")) && token.ends_with('\'') {
        let inner = &token[2..token.len() - 1];
        if let Ok(bytes) = hex::decode(inner) {
            return Some(SqlValue::Bytes(bytes));
        }
    }
    None
}

/// Count `?` placeholders outside string literals
pub fn count_placeholders(input: &str) -> usize {
    let mut count = 0;
    let mut in_string = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
        } else if c == '\'' {
            in_string = true;
        } else if c == '?' {
            count += 1;
        }
    }
    count
}

/// Whether `text` mentions `identifier` as a whole word outside strings
pub fn mentions_identifier(text: &str, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    let chars: Vec<char> = text.chars().collect();
    let ident: Vec<char> = identifier.chars().collect();
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                if chars.get(i + 1) == Some(&'\'') {
                    i += 1;
                } else {
                    in_string = false;
                }
            }
            i += 1;
            continue;
        }
        if c == '\'' {
            in_string = true;
            i += 1;
            continue;
        }
        if i + ident.len() <= chars.len()
            && chars[i..i + ident.len()]
                .iter()
                .zip(ident.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            let before_ok = i == 0 || !is_ident_char(chars[i - 1]);
            let after_ok = i + ident.len() == chars.len()
                || !is_ident_char(chars[i + ident.len()]);
            if before_ok && after_ok {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Strip one level of surrounding parentheses
pub fn strip_parens(token: &str) -> Option<&str> {
    let token = token.trim();
    if token.starts_with('(') && token.ends_with(')') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}
