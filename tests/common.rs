//! Common test utilities and fixtures for the integration suite
//!
//! Provides [`MemoryBackend`], a miniature in-process table store that
//! implements the backend contract over the grammar the rewriter emits:
//! CREATE TABLE, single-table INSERT/SELECT/UPDATE/DELETE with `?`
//! parameters and flat WHERE lists. It compares stored values exactly as
//! given and knows nothing about encryption — which is the point: whatever
//! reaches it must already be ciphertext.

use sqlcloak::rewrite::statement::{
    Condition, ParsedValue, Projection, Statement, ValueItem, WhereClause,
};
use sqlcloak::rewrite::token::Connector;
use sqlcloak::{Backend, BackendConnection, BackendError, BackendRows, SqlValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;

/// Initialize test logging once; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

static RE_CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)\s*\((.+)\)\s*$")
        .unwrap()
});

static RE_DROP_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?(\w+)\s*$").unwrap()
});

#[derive(Debug, Default, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Result<usize, BackendError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown column: {}", name).into())
    }
}

#[derive(Debug, Default)]
struct Store {
    tables: HashMap<String, Table>,
}

/// Shared in-memory database; all connections view the same tables
///
/// Clones share the same store and counters.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
    closes: Arc<AtomicUsize>,
    statements: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            closes: Arc::new(AtomicUsize::new(0)),
            statements: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times any connection's close reached the backend
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// How many execute/query calls reached the backend
    pub fn statement_count(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    /// Direct access to a table's raw stored rows, bypassing the layer
    pub fn raw_rows(&self, table: &str) -> Option<Vec<Vec<SqlValue>>> {
        let store = self.store.lock().unwrap();
        store
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.clone())
    }

    /// Direct access to a table's column names, bypassing the layer
    pub fn raw_columns(&self, table: &str) -> Option<Vec<String>> {
        let store = self.store.lock().unwrap();
        store
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.columns.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    type Conn = MemoryConnection;

    fn connection(&self) -> Result<MemoryConnection, BackendError> {
        Ok(MemoryConnection {
            store: Arc::clone(&self.store),
            closes: Arc::clone(&self.closes),
            statements: Arc::clone(&self.statements),
        })
    }
}

pub struct MemoryConnection {
    store: Arc<Mutex<Store>>,
    closes: Arc<AtomicUsize>,
    statements: Arc<AtomicUsize>,
}

impl BackendConnection for MemoryConnection {
    type Rows = MemoryRows;

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BackendError> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        let mut store = self.store.lock().unwrap();

        if let Some(caps) = RE_CREATE_TABLE.captures(sql) {
            let name = caps.get(1).unwrap().as_str().to_ascii_lowercase();
            let columns = caps
                .get(2)
                .unwrap()
                .as_str()
                .split(',')
                .filter_map(|def| def.split_whitespace().next())
                .map(|c| c.to_string())
                .collect();
            store.tables.insert(
                name,
                Table {
                    columns,
                    rows: Vec::new(),
                },
            );
            return Ok(0);
        }

        if let Some(caps) = RE_DROP_TABLE.captures(sql) {
            let name = caps.get(1).unwrap().as_str().to_ascii_lowercase();
            store.tables.remove(&name);
            return Ok(0);
        }

        match Statement::parse(sql) {
            Statement::Insert(insert) => {
                let mut cursor = Params::new(params);
                let table_name = insert.table.to_ascii_lowercase();
                let table = store
                    .tables
                    .get_mut(&table_name)
                    .ok_or_else(|| format!("unknown table: {}", insert.table))?;
                let target_columns: Vec<usize> = if insert.columns.is_empty() {
                    (0..table.columns.len()).collect()
                } else {
                    insert
                        .columns
                        .iter()
                        .map(|c| table.column_index(c))
                        .collect::<Result<_, _>>()?
                };
                let width = table.columns.len();
                let mut inserted = 0;
                for row in &insert.rows {
                    if row.len() != target_columns.len() {
                        return Err("value count does not match column count".into());
                    }
                    let mut stored = vec![SqlValue::Null; width];
                    for (index, item) in target_columns.iter().zip(row) {
                        stored[*index] = cursor.resolve(item)?;
                    }
                    table.rows.push(stored);
                    inserted += 1;
                }
                Ok(inserted)
            }
            Statement::Update(update) => {
                let mut cursor = Params::new(params);
                let table_name = update.table.to_ascii_lowercase();
                let table = store
                    .tables
                    .get_mut(&table_name)
                    .ok_or_else(|| format!("unknown table: {}", update.table))?;
                let assignments: Vec<(usize, SqlValue)> = update
                    .assignments
                    .iter()
                    .map(|a| Ok((table.column_index(&a.column)?, cursor.resolve(&a.value)?)))
                    .collect::<Result<_, BackendError>>()?;
                let matcher =
                    RowMatcher::compile(table, update.where_clause.as_ref(), &mut cursor)?;
                let mut affected = 0;
                for row in table.rows.iter_mut() {
                    if matcher.matches(row) {
                        for (index, value) in &assignments {
                            row[*index] = value.clone();
                        }
                        affected += 1;
                    }
                }
                Ok(affected)
            }
            Statement::Delete(delete) => {
                let mut cursor = Params::new(params);
                let table_name = delete.table.to_ascii_lowercase();
                let table = store
                    .tables
                    .get_mut(&table_name)
                    .ok_or_else(|| format!("unknown table: {}", delete.table))?;
                let matcher =
                    RowMatcher::compile(table, delete.where_clause.as_ref(), &mut cursor)?;
                let before = table.rows.len();
                let mut remaining = Vec::with_capacity(before);
                for row in table.rows.drain(..) {
                    if matcher.matches(&row) {
                        continue;
                    }
                    remaining.push(row);
                }
                table.rows = remaining;
                Ok((before - table.rows.len()) as u64)
            }
            Statement::Select(_) => Err("SELECT must go through query()".into()),
            Statement::Passthrough => Err(format!("unsupported statement: {}", sql).into()),
        }
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<MemoryRows, BackendError> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        let store = self.store.lock().unwrap();
        let select = match Statement::parse(sql) {
            Statement::Select(select) => select,
            _ => return Err(format!("not a query: {}", sql).into()),
        };
        let mut cursor = Params::new(params);
        let table_name = select.table.to_ascii_lowercase();
        let table = store
            .tables
            .get(&table_name)
            .ok_or_else(|| format!("unknown table: {}", select.table))?;

        let projected: Vec<usize> = match &select.projection {
            Projection::Wildcard => (0..table.columns.len()).collect(),
            Projection::Columns(columns) => columns
                .iter()
                .map(|c| table.column_index(c))
                .collect::<Result<_, _>>()?,
            Projection::Raw(raw) => {
                return Err(format!("unsupported projection: {}", raw).into())
            }
        };

        let matcher = RowMatcher::compile(table, select.where_clause.as_ref(), &mut cursor)?;
        let rows = table
            .rows
            .iter()
            .filter(|row| matcher.matches(row))
            .map(|row| projected.iter().map(|i| row[*i].clone()).collect())
            .collect();
        let columns = projected
            .iter()
            .map(|i| table.columns[*i].clone())
            .collect();
        Ok(MemoryRows { columns, rows })
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryRows {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl BackendRows for MemoryRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, BackendError> {
        if self.rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.rows.remove(0)))
        }
    }
}

struct Params<'p> {
    params: &'p [SqlValue],
    index: usize,
}

impl<'p> Params<'p> {
    fn new(params: &'p [SqlValue]) -> Self {
        Self { params, index: 0 }
    }

    fn next(&mut self) -> Result<SqlValue, BackendError> {
        let value = self
            .params
            .get(self.index)
            .cloned()
            .ok_or("not enough parameters")?;
        self.index += 1;
        Ok(value)
    }

    fn resolve(&mut self, item: &ValueItem) -> Result<SqlValue, BackendError> {
        match &item.parsed {
            Some(ParsedValue::Placeholder) => self.next(),
            Some(ParsedValue::Literal(value)) => Ok(value.clone()),
            None => Err(format!("unsupported expression: {}", item.raw).into()),
        }
    }
}

enum CompiledCondition {
    Equality {
        index: usize,
        value: SqlValue,
    },
    InList {
        index: usize,
        values: Vec<SqlValue>,
    },
    Comparison {
        index: usize,
        operator: String,
        value: SqlValue,
    },
    Like {
        index: usize,
        negated: bool,
        pattern: String,
    },
    Between {
        index: usize,
        negated: bool,
        low: SqlValue,
        high: SqlValue,
    },
    IsNull {
        index: usize,
        negated: bool,
    },
}

impl CompiledCondition {
    fn evaluate(&self, row: &[SqlValue]) -> bool {
        match self {
            CompiledCondition::Equality { index, value } => {
                !value.is_null() && !row[*index].is_null() && row[*index] == *value
            }
            CompiledCondition::InList { index, values } => {
                !row[*index].is_null() && values.iter().any(|v| *v == row[*index])
            }
            CompiledCondition::Comparison {
                index,
                operator,
                value,
            } => match compare(&row[*index], value) {
                None => false,
                Some(ordering) => match operator.as_str() {
                    "<" => ordering.is_lt(),
                    "<=" => ordering.is_le(),
                    ">" => ordering.is_gt(),
                    ">=" => ordering.is_ge(),
                    "!=" | "<>" => ordering.is_ne(),
                    _ => false,
                },
            },
            CompiledCondition::Like {
                index,
                negated,
                pattern,
            } => {
                let matched = match &row[*index] {
                    SqlValue::Text(s) => like_match(s, pattern),
                    _ => false,
                };
                matched != *negated
            }
            CompiledCondition::Between {
                index,
                negated,
                low,
                high,
            } => {
                let inside = compare(&row[*index], low)
                    .map(|o| o.is_ge())
                    .unwrap_or(false)
                    && compare(&row[*index], high)
                        .map(|o| o.is_le())
                        .unwrap_or(false);
                inside != *negated
            }
            CompiledCondition::IsNull { index, negated } => row[*index].is_null() != *negated,
        }
    }
}

struct RowMatcher {
    conditions: Vec<(Option<Connector>, CompiledCondition)>,
}

impl RowMatcher {
    fn compile(
        table: &Table,
        clause: Option<&WhereClause>,
        cursor: &mut Params<'_>,
    ) -> Result<Self, BackendError> {
        let mut conditions = Vec::new();
        if let Some(clause) = clause {
            for (connector, condition) in &clause.conditions {
                let compiled = match condition {
                    Condition::Equality { column, value } => CompiledCondition::Equality {
                        index: table.column_index(column)?,
                        value: cursor.resolve(value)?,
                    },
                    Condition::InList { column, values } => CompiledCondition::InList {
                        index: table.column_index(column)?,
                        values: values
                            .iter()
                            .map(|v| cursor.resolve(v))
                            .collect::<Result<_, _>>()?,
                    },
                    Condition::Comparison {
                        column,
                        operator,
                        value,
                    } => CompiledCondition::Comparison {
                        index: table.column_index(column)?,
                        operator: operator.clone(),
                        value: cursor.resolve(value)?,
                    },
                    Condition::Like {
                        column,
                        negated,
                        pattern,
                    } => {
                        let pattern = match cursor.resolve(pattern)? {
                            SqlValue::Text(s) => s,
                            other => {
                                return Err(format!("bad LIKE pattern: {}", other).into())
                            }
                        };
                        CompiledCondition::Like {
                            index: table.column_index(column)?,
                            negated: *negated,
                            pattern,
                        }
                    }
                    Condition::Between {
                        column,
                        negated,
                        low,
                        high,
                    } => CompiledCondition::Between {
                        index: table.column_index(column)?,
                        negated: *negated,
                        low: cursor.resolve(low)?,
                        high: cursor.resolve(high)?,
                    },
                    Condition::IsNull { column, negated } => CompiledCondition::IsNull {
                        index: table.column_index(column)?,
                        negated: *negated,
                    },
                    Condition::Raw(text) => {
                        return Err(format!("unsupported condition: {}", text).into())
                    }
                };
                conditions.push((*connector, compiled));
            }
        }
        Ok(Self { conditions })
    }

    fn matches(&self, row: &[SqlValue]) -> bool {
        let mut result = true;
        for (connector, condition) in &self.conditions {
            let value = condition.evaluate(row);
            match connector {
                None => result = value,
                Some(Connector::And) => result = result && value,
                Some(Connector::Or) => result = result || value,
            }
        }
        result
    }
}

fn compare(left: &SqlValue, right: &SqlValue) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (SqlValue::Integer(a), SqlValue::Integer(b)) => Some(a.cmp(b)),
        (SqlValue::Real(a), SqlValue::Real(b)) => a.partial_cmp(b),
        (SqlValue::Integer(a), SqlValue::Real(b)) => (*a as f64).partial_cmp(b),
        (SqlValue::Real(a), SqlValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Minimal SQL LIKE with `%` wildcards
fn like_match(value: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('%').collect();
    if segments.len() == 1 {
        return value == pattern;
    }
    let mut rest = value;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}
