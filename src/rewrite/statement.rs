//! Statement analysis: classify SQL into the supported statement kinds
//!
//! The grammar covers exactly what the encryption layer needs: single-table
//! INSERT/UPDATE/SELECT/DELETE with literal or `?` values and flat WHERE
//! condition lists. Everything else is a passthrough; the rewriter decides
//! whether a passthrough is safe for the configured rules.

use crate::rewrite::token::{
    self, is_bare_identifier, is_placeholder, parse_literal, split_top_level,
    split_where_conditions, strip_parens, Connector,
};
use crate::value::SqlValue;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_INSERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*INSERT\s+INTO\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(([^)]*)\)\s*)?VALUES\s*(.+?)\s*;?\s*$",
    )
    .unwrap()
});

static RE_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*UPDATE\s+([A-Za-z_][A-Za-z0-9_]*)\s+SET\s+(.+?)(?:\s+WHERE\s+(.+?))?\s*;?\s*$",
    )
    .unwrap()
});

static RE_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+WHERE\s+(.+?))?(?:\s+((?:ORDER\s+BY|GROUP\s+BY|LIMIT)\s+.+?))?\s*;?\s*$",
    )
    .unwrap()
});

static RE_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*DELETE\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+WHERE\s+(.+?))?\s*;?\s*$")
        .unwrap()
});

static RE_DML_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(SELECT|INSERT|UPDATE|DELETE)\b").unwrap());

/// A value site in a statement: its original text plus a parsed form when
/// the text is a literal or a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct ValueItem {
    /// Original token text, trimmed
    pub raw: String,
    /// Parsed form, when encodable
    pub parsed: Option<ParsedValue>,
}

/// Parsed form of a value site
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// An inline SQL literal
    Literal(SqlValue),
    /// A `?` parameter placeholder
    Placeholder,
}

impl ValueItem {
    fn from_token(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = if is_placeholder(&raw) {
            Some(ParsedValue::Placeholder)
        } else {
            parse_literal(&raw).map(ParsedValue::Literal)
        };
        Self { raw, parsed }
    }
}

/// One SET assignment of an UPDATE
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: ValueItem,
}

/// A single WHERE condition
#[derive(Debug, Clone)]
pub enum Condition {
    /// `column = value`
    Equality { column: String, value: ValueItem },
    /// `column IN (v, v, ...)`
    InList { column: String, values: Vec<ValueItem> },
    /// `column <op> value` for a non-equality comparison operator
    Comparison {
        column: String,
        operator: String,
        value: ValueItem,
    },
    /// `column [NOT] LIKE pattern`
    Like {
        column: String,
        negated: bool,
        pattern: ValueItem,
    },
    /// `column [NOT] BETWEEN low AND high`
    Between {
        column: String,
        negated: bool,
        low: ValueItem,
        high: ValueItem,
    },
    /// `column IS [NOT] NULL`
    IsNull { column: String, negated: bool },
    /// Anything the condition grammar does not cover
    Raw(String),
}

/// A WHERE clause as an ordered condition list with connectors
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub conditions: Vec<(Option<Connector>, Condition)>,
}

/// The SELECT projection
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    Wildcard,
    /// A list of bare column identifiers
    Columns(Vec<String>),
    /// Any other projection expression, kept verbatim
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: String,
    /// Explicit column list; empty when the statement omitted it
    pub columns: Vec<String>,
    /// One entry per VALUES tuple
    pub rows: Vec<Vec<ValueItem>>,
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<WhereClause>,
}

#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub table: String,
    pub projection: Projection,
    pub where_clause: Option<WhereClause>,
    /// Trailing ORDER BY / GROUP BY / LIMIT clause, reattached verbatim
    pub tail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<WhereClause>,
}

/// A classified statement
#[derive(Debug, Clone)]
pub enum Statement {
    Insert(InsertStatement),
    Update(UpdateStatement),
    Select(SelectStatement),
    Delete(DeleteStatement),
    /// Outside the supported grammar; forwarded unchanged when safe
    Passthrough,
}

impl Statement {
    /// Classify a SQL string
    pub fn parse(sql: &str) -> Statement {
        if let Some(caps) = RE_INSERT.captures(sql) {
            let table = caps.get(1).unwrap().as_str().to_string();
            let columns = caps
                .get(2)
                .map(|m| {
                    split_top_level(m.as_str(), ',')
                        .into_iter()
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            if let Some(rows) = parse_values_tuples(caps.get(3).unwrap().as_str()) {
                return Statement::Insert(InsertStatement {
                    table,
                    columns,
                    rows,
                });
            }
            return Statement::Passthrough;
        }

        if let Some(caps) = RE_UPDATE.captures(sql) {
            let table = caps.get(1).unwrap().as_str().to_string();
            if let Some(assignments) = parse_assignments(caps.get(2).unwrap().as_str()) {
                let where_clause = caps.get(3).map(|m| parse_where(m.as_str()));
                return Statement::Update(UpdateStatement {
                    table,
                    assignments,
                    where_clause,
                });
            }
            return Statement::Passthrough;
        }

        if let Some(caps) = RE_SELECT.captures(sql) {
            let projection = parse_projection(caps.get(1).unwrap().as_str());
            let table = caps.get(2).unwrap().as_str().to_string();
            let where_clause = caps.get(3).map(|m| parse_where(m.as_str()));
            let tail = caps.get(4).map(|m| m.as_str().trim().to_string());
            return Statement::Select(SelectStatement {
                table,
                projection,
                where_clause,
                tail,
            });
        }

        if let Some(caps) = RE_DELETE.captures(sql) {
            let table = caps.get(1).unwrap().as_str().to_string();
            let where_clause = caps.get(2).map(|m| parse_where(m.as_str()));
            return Statement::Delete(DeleteStatement {
                table,
                where_clause,
            });
        }

        Statement::Passthrough
    }

    /// Whether the SQL starts with a DML keyword, regardless of whether the
    /// full grammar matched
    pub fn looks_like_dml(sql: &str) -> bool {
        RE_DML_KEYWORD.is_match(sql)
    }
}

fn parse_values_tuples(tail: &str) -> Option<Vec<Vec<ValueItem>>> {
    let mut rows = Vec::new();
    for tuple in split_top_level(tail, ',') {
        let inner = strip_parens(&tuple)?;
        let items: Vec<ValueItem> = split_top_level(inner, ',')
            .iter()
            .map(|t| ValueItem::from_token(t))
            .collect();
        if items.is_empty() {
            return None;
        }
        rows.push(items);
    }
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn parse_assignments(set_clause: &str) -> Option<Vec<Assignment>> {
    let mut assignments = Vec::new();
    for part in split_top_level(set_clause, ',') {
        let (column, value) = part.split_once('=')?;
        let column = column.trim().to_string();
        if !is_bare_identifier(&column) {
            return None;
        }
        assignments.push(Assignment {
            column,
            value: ValueItem::from_token(value),
        });
    }
    if assignments.is_empty() {
        None
    } else {
        Some(assignments)
    }
}

fn parse_projection(projection: &str) -> Projection {
    let projection = projection.trim();
    if projection == "*" {
        return Projection::Wildcard;
    }
    let parts = split_top_level(projection, ',');
    if parts.iter().all(|p| is_bare_identifier(p)) {
        Projection::Columns(parts)
    } else {
        Projection::Raw(projection.to_string())
    }
}

static RE_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+IN\s*\((.+)\)$").unwrap()
});

static RE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+(NOT\s+)?LIKE\s+(.+)$").unwrap()
});

static RE_BETWEEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+(NOT\s+)?BETWEEN\s+(.+)$").unwrap()
});

static RE_IS_NULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+IS\s+(NOT\s+)?NULL$").unwrap()
});

static RE_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s*(<>|!=|<=|>=|=|<|>)\s*(.+)$").unwrap()
});

fn parse_where(where_clause: &str) -> WhereClause {
    let conditions = split_where_conditions(where_clause)
        .into_iter()
        .map(|(connector, text)| (connector, parse_condition(&text)))
        .collect();
    WhereClause { conditions }
}

fn parse_condition(text: &str) -> Condition {
    if let Some(caps) = RE_IS_NULL.captures(text) {
        return Condition::IsNull {
            column: caps.get(1).unwrap().as_str().to_string(),
            negated: caps.get(2).is_some(),
        };
    }
    if let Some(caps) = RE_IN.captures(text) {
        let values = split_top_level(caps.get(2).unwrap().as_str(), ',')
            .iter()
            .map(|t| ValueItem::from_token(t))
            .collect();
        return Condition::InList {
            column: caps.get(1).unwrap().as_str().to_string(),
            values,
        };
    }
    if let Some(caps) = RE_LIKE.captures(text) {
        return Condition::Like {
            column: caps.get(1).unwrap().as_str().to_string(),
            negated: caps.get(2).is_some(),
            pattern: ValueItem::from_token(caps.get(3).unwrap().as_str()),
        };
    }
    if let Some(caps) = RE_BETWEEN.captures(text) {
        let column = caps.get(1).unwrap().as_str().to_string();
        let negated = caps.get(2).is_some();
        // The condition splitter keeps BETWEEN's inner AND; split it here.
        let bounds = token::split_where_conditions(caps.get(3).unwrap().as_str());
        if bounds.len() == 2 {
            return Condition::Between {
                column,
                negated,
                low: ValueItem::from_token(&bounds[0].1),
                high: ValueItem::from_token(&bounds[1].1),
            };
        }
        return Condition::Raw(text.to_string());
    }
    if let Some(caps) = RE_COMPARISON.captures(text) {
        let column = caps.get(1).unwrap().as_str().to_string();
        let operator = caps.get(2).unwrap().as_str().to_string();
        let value = ValueItem::from_token(caps.get(3).unwrap().as_str());
        if operator == "=" {
            return Condition::Equality { column, value };
        }
        return Condition::Comparison {
            column,
            operator,
            value,
        };
    }
    Condition::Raw(text.to_string())
}
