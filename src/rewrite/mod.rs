//! Statement rewriting: plaintext SQL in, ciphertext SQL out
//!
//! The rewriter walks a classified statement, replaces every value bound to
//! an encrypted column with a `?` whose parameter is the encoded value,
//! appends assist-column slots where configured, and retargets equality
//! predicates on assisted columns to their assist columns. Predicates that
//! cannot be evaluated safely against ciphertext fail fast here, before any
//! SQL reaches the real connection.

pub mod statement;
pub mod token;

use crate::config::ColumnBinding;
use crate::encryptor::{AssistedEncryptor, Encryptor};
use crate::error::{CloakError, CloakResult};
use crate::rule::EncryptRule;
use crate::value::SqlValue;
use statement::{
    Condition, DeleteStatement, InsertStatement, ParsedValue, Projection, SelectStatement,
    Statement, UpdateStatement, ValueItem, WhereClause,
};
use token::count_placeholders;

/// The outcome of rewriting one statement
#[derive(Debug, Clone)]
pub struct RewriteResult {
    /// Rewritten SQL text
    pub sql: String,
    /// Ordered bound parameter values, post-encoding
    pub params: Vec<SqlValue>,
    /// Target table, when the statement was analyzed
    pub table: Option<String>,
    /// SELECT projection, consumed by the result decryptor
    pub projection: Option<Projection>,
}

impl RewriteResult {
    fn passthrough(sql: &str, params: &[SqlValue]) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.to_vec(),
            table: None,
            projection: None,
        }
    }
}

/// Consumes caller-supplied parameters in placeholder order
struct ParamCursor<'p> {
    params: &'p [SqlValue],
    index: usize,
}

impl<'p> ParamCursor<'p> {
    fn new(params: &'p [SqlValue]) -> Self {
        Self { params, index: 0 }
    }

    fn next(&mut self) -> CloakResult<SqlValue> {
        let value = self.params.get(self.index).cloned().ok_or_else(|| {
            CloakError::configuration("statement has more placeholders than parameters")
        })?;
        self.index += 1;
        Ok(value)
    }

    fn take(&mut self, count: usize, out: &mut Vec<SqlValue>) -> CloakResult<()> {
        for _ in 0..count {
            let value = self.next()?;
            out.push(value);
        }
        Ok(())
    }

    fn finish(self) -> CloakResult<()> {
        if self.index != self.params.len() {
            return Err(CloakError::configuration(
                "statement has fewer placeholders than parameters",
            ));
        }
        Ok(())
    }
}

/// Rewrites statements against a compiled rule
pub struct StatementRewriter<'a> {
    rule: &'a EncryptRule,
}

impl<'a> StatementRewriter<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        Self { rule }
    }

    /// Rewrite a statement, encoding values for encrypted columns
    pub fn rewrite(&self, sql: &str, params: &[SqlValue]) -> CloakResult<RewriteResult> {
        match Statement::parse(sql) {
            Statement::Passthrough => {
                // DML the grammar could not analyze must not slip through
                // when it touches an encrypted table: the result would be
                // ciphertext compared or returned as if it were plaintext.
                if Statement::looks_like_dml(sql) {
                    for table in self.rule.bound_tables() {
                        if token::mentions_identifier(sql, table) {
                            return Err(CloakError::Configuration {
                                message: format!(
                                    "cannot analyze statement referencing encrypted table '{}'",
                                    table
                                ),
                            });
                        }
                    }
                }
                Ok(RewriteResult::passthrough(sql, params))
            }
            Statement::Insert(insert) => self.rewrite_insert(sql, insert, params),
            Statement::Update(update) => self.rewrite_update(sql, update, params),
            Statement::Select(select) => self.rewrite_select(sql, select, params),
            Statement::Delete(delete) => self.rewrite_delete(sql, delete, params),
        }
    }

    fn rewrite_insert(
        &self,
        sql: &str,
        insert: InsertStatement,
        params: &[SqlValue],
    ) -> CloakResult<RewriteResult> {
        if !self.rule.table_has_bindings(&insert.table) {
            return Ok(RewriteResult::passthrough(sql, params));
        }
        if insert.columns.is_empty() {
            return Err(CloakError::Configuration {
                message: format!(
                    "INSERT into encrypted table '{}' requires an explicit column list",
                    insert.table
                ),
            });
        }
        for column in &insert.columns {
            if self.rule.is_assist_column(&insert.table, column) {
                return Err(CloakError::Configuration {
                    message: format!(
                        "assist column '{}' of table '{}' must not be assigned directly",
                        column, insert.table
                    ),
                });
            }
        }

        // Assist slots are appended in column-list order.
        let mut assist_columns = Vec::new();
        for column in &insert.columns {
            if let Some(binding) = self.rule.resolve(&insert.table, column) {
                if let Some(assist_column) = &binding.assist_column {
                    assist_columns.push(assist_column.clone());
                }
            }
        }

        let mut cursor = ParamCursor::new(params);
        let mut out_params = Vec::new();
        let mut tuples = Vec::with_capacity(insert.rows.len());

        for row in &insert.rows {
            if row.len() != insert.columns.len() {
                return Err(CloakError::Configuration {
                    message: format!(
                        "INSERT into '{}' has {} values for {} columns",
                        insert.table,
                        row.len(),
                        insert.columns.len()
                    ),
                });
            }
            let mut tokens = Vec::with_capacity(row.len() + assist_columns.len());
            let mut assists = Vec::new();
            for (column, item) in insert.columns.iter().zip(row) {
                match self.rule.resolve(&insert.table, column) {
                    Some(binding) => {
                        let (token, assist) =
                            self.encode_slot(binding, item, &mut cursor, &mut out_params)?;
                        tokens.push(token);
                        if let Some(assist) = assist {
                            assists.push(assist);
                        }
                    }
                    None => {
                        tokens.push(render_unbound(item, &mut cursor, &mut out_params)?);
                    }
                }
            }
            for assist in assists {
                tokens.push("?".to_string());
                out_params.push(assist);
            }
            tuples.push(format!("({})", tokens.join(", ")));
        }
        cursor.finish()?;

        let mut columns = insert.columns.clone();
        columns.extend(assist_columns);

        Ok(RewriteResult {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {}",
                insert.table,
                columns.join(", "),
                tuples.join(", ")
            ),
            params: out_params,
            table: Some(insert.table),
            projection: None,
        })
    }

    fn rewrite_update(
        &self,
        sql: &str,
        update: UpdateStatement,
        params: &[SqlValue],
    ) -> CloakResult<RewriteResult> {
        if !self.rule.table_has_bindings(&update.table) {
            return Ok(RewriteResult::passthrough(sql, params));
        }

        let mut cursor = ParamCursor::new(params);
        let mut out_params = Vec::new();
        let mut assignments = Vec::new();

        for assignment in &update.assignments {
            if self.rule.is_assist_column(&update.table, &assignment.column) {
                return Err(CloakError::Configuration {
                    message: format!(
                        "assist column '{}' of table '{}' must not be assigned directly",
                        assignment.column, update.table
                    ),
                });
            }
            match self.rule.resolve(&update.table, &assignment.column) {
                Some(binding) => {
                    let (token, assist) =
                        self.encode_slot(binding, &assignment.value, &mut cursor, &mut out_params)?;
                    assignments.push(format!("{} = {}", assignment.column, token));
                    if let Some(assist) = assist {
                        let assist_column = binding.assist_column.as_deref().unwrap_or_default();
                        assignments.push(format!("{} = ?", assist_column));
                        out_params.push(assist);
                    }
                }
                None => {
                    let token =
                        render_unbound(&assignment.value, &mut cursor, &mut out_params)?;
                    assignments.push(format!("{} = {}", assignment.column, token));
                }
            }
        }

        let where_sql = match &update.where_clause {
            Some(clause) => Some(self.rewrite_where(
                &update.table,
                clause,
                &mut cursor,
                &mut out_params,
            )?),
            None => None,
        };
        cursor.finish()?;

        let mut out_sql = format!("UPDATE {} SET {}", update.table, assignments.join(", "));
        if let Some(where_sql) = where_sql {
            out_sql.push_str(" WHERE ");
            out_sql.push_str(&where_sql);
        }

        Ok(RewriteResult {
            sql: out_sql,
            params: out_params,
            table: Some(update.table),
            projection: None,
        })
    }

    fn rewrite_select(
        &self,
        sql: &str,
        select: SelectStatement,
        params: &[SqlValue],
    ) -> CloakResult<RewriteResult> {
        if !self.rule.table_has_bindings(&select.table) {
            let mut result = RewriteResult::passthrough(sql, params);
            result.table = Some(select.table);
            result.projection = Some(select.projection);
            return Ok(result);
        }

        let mut cursor = ParamCursor::new(params);
        let mut out_params = Vec::new();

        let projection_sql = match &select.projection {
            Projection::Wildcard => "*".to_string(),
            Projection::Columns(columns) => columns.join(", "),
            Projection::Raw(raw) => {
                cursor.take(count_placeholders(raw), &mut out_params)?;
                raw.clone()
            }
        };

        let where_sql = match &select.where_clause {
            Some(clause) => Some(self.rewrite_where(
                &select.table,
                clause,
                &mut cursor,
                &mut out_params,
            )?),
            None => None,
        };

        if let Some(tail) = &select.tail {
            cursor.take(count_placeholders(tail), &mut out_params)?;
        }
        cursor.finish()?;

        let mut out_sql = format!("SELECT {} FROM {}", projection_sql, select.table);
        if let Some(where_sql) = where_sql {
            out_sql.push_str(" WHERE ");
            out_sql.push_str(&where_sql);
        }
        if let Some(tail) = &select.tail {
            out_sql.push(' ');
            out_sql.push_str(tail);
        }

        Ok(RewriteResult {
            sql: out_sql,
            params: out_params,
            table: Some(select.table),
            projection: Some(select.projection),
        })
    }

    fn rewrite_delete(
        &self,
        sql: &str,
        delete: DeleteStatement,
        params: &[SqlValue],
    ) -> CloakResult<RewriteResult> {
        if !self.rule.table_has_bindings(&delete.table) {
            return Ok(RewriteResult::passthrough(sql, params));
        }

        let mut cursor = ParamCursor::new(params);
        let mut out_params = Vec::new();
        let where_sql = match &delete.where_clause {
            Some(clause) => Some(self.rewrite_where(
                &delete.table,
                clause,
                &mut cursor,
                &mut out_params,
            )?),
            None => None,
        };
        cursor.finish()?;

        let mut out_sql = format!("DELETE FROM {}", delete.table);
        if let Some(where_sql) = where_sql {
            out_sql.push_str(" WHERE ");
            out_sql.push_str(&where_sql);
        }

        Ok(RewriteResult {
            sql: out_sql,
            params: out_params,
            table: Some(delete.table),
            projection: None,
        })
    }

    /// Encode one value slot bound to an encrypted column
    ///
    /// Returns the output token (always `?` once encoded) and, when the
    /// binding is assisted, the encoded assist value for its slot. NULL
    /// passes through unencrypted on both slots.
    fn encode_slot(
        &self,
        binding: &ColumnBinding,
        item: &ValueItem,
        cursor: &mut ParamCursor<'_>,
        out_params: &mut Vec<SqlValue>,
    ) -> CloakResult<(String, Option<SqlValue>)> {
        let plaintext = self.plaintext_of(binding, item, cursor)?;
        let assisted = self.rule.assisted_for(binding)?;

        if plaintext.is_null() {
            out_params.push(SqlValue::Null);
            return Ok(("?".to_string(), assisted.map(|_| SqlValue::Null)));
        }

        let encryptor = self.rule.encryptor_for(binding)?;
        out_params.push(encryptor.encryptor().encrypt(&plaintext)?);
        let assist = match assisted {
            Some(assisted) => Some(assisted.assist_value(&plaintext)?),
            None => None,
        };
        Ok(("?".to_string(), assist))
    }

    fn plaintext_of(
        &self,
        binding: &ColumnBinding,
        item: &ValueItem,
        cursor: &mut ParamCursor<'_>,
    ) -> CloakResult<SqlValue> {
        match &item.parsed {
            Some(ParsedValue::Placeholder) => cursor.next(),
            Some(ParsedValue::Literal(value)) => Ok(value.clone()),
            None => Err(CloakError::Configuration {
                message: format!(
                    "cannot encrypt non-literal expression '{}' for column {}.{}",
                    item.raw, binding.table, binding.column
                ),
            }),
        }
    }

    fn rewrite_where(
        &self,
        table: &str,
        clause: &WhereClause,
        cursor: &mut ParamCursor<'_>,
        out_params: &mut Vec<SqlValue>,
    ) -> CloakResult<String> {
        let mut out = String::new();
        for (connector, condition) in &clause.conditions {
            if let Some(connector) = connector {
                out.push(' ');
                out.push_str(connector.as_sql());
                out.push(' ');
            }
            let rendered = self.rewrite_condition(table, condition, cursor, out_params)?;
            out.push_str(&rendered);
        }
        Ok(out)
    }

    fn rewrite_condition(
        &self,
        table: &str,
        condition: &Condition,
        cursor: &mut ParamCursor<'_>,
        out_params: &mut Vec<SqlValue>,
    ) -> CloakResult<String> {
        match condition {
            Condition::Equality { column, value } => {
                match self.rule.resolve(table, column) {
                    None => {
                        let token = render_unbound(value, cursor, out_params)?;
                        Ok(format!("{} = {}", column, token))
                    }
                    Some(binding) => {
                        let plaintext = self.plaintext_of(binding, value, cursor)?;
                        let (target, encoded) = self.encode_comparable(binding, &plaintext)?;
                        out_params.push(encoded);
                        Ok(format!("{} = ?", target))
                    }
                }
            }
            Condition::InList { column, values } => {
                match self.rule.resolve(table, column) {
                    None => {
                        let mut tokens = Vec::with_capacity(values.len());
                        for value in values {
                            tokens.push(render_unbound(value, cursor, out_params)?);
                        }
                        Ok(format!("{} IN ({})", column, tokens.join(", ")))
                    }
                    Some(binding) => {
                        // IN is per-element equality; every element is
                        // encoded against the same comparison target.
                        let mut target = None;
                        let mut tokens = Vec::with_capacity(values.len());
                        for value in values {
                            let plaintext = self.plaintext_of(binding, value, cursor)?;
                            let (column_target, encoded) =
                                self.encode_comparable(binding, &plaintext)?;
                            target = Some(column_target);
                            out_params.push(encoded);
                            tokens.push("?".to_string());
                        }
                        let target = target.ok_or_else(|| {
                            CloakError::unsupported_predicate(format!(
                                "empty IN list on encrypted column {}.{}",
                                table, column
                            ))
                        })?;
                        Ok(format!("{} IN ({})", target, tokens.join(", ")))
                    }
                }
            }
            Condition::Comparison {
                column,
                operator,
                value,
            } => match self.rule.resolve(table, column) {
                None => {
                    let token = render_unbound(value, cursor, out_params)?;
                    Ok(format!("{} {} {}", column, operator, token))
                }
                Some(_) => Err(CloakError::UnsupportedPredicate {
                    message: format!(
                        "operator '{}' is not supported on encrypted column {}.{}",
                        operator, table, column
                    ),
                }),
            },
            Condition::Like {
                column,
                negated,
                pattern,
            } => match self.rule.resolve(table, column) {
                None => {
                    let token = render_unbound(pattern, cursor, out_params)?;
                    let keyword = if *negated { "NOT LIKE" } else { "LIKE" };
                    Ok(format!("{} {} {}", column, keyword, token))
                }
                Some(_) => Err(CloakError::UnsupportedPredicate {
                    message: format!(
                        "LIKE is not supported on encrypted column {}.{}",
                        table, column
                    ),
                }),
            },
            Condition::Between {
                column,
                negated,
                low,
                high,
            } => match self.rule.resolve(table, column) {
                None => {
                    let low_token = render_unbound(low, cursor, out_params)?;
                    let high_token = render_unbound(high, cursor, out_params)?;
                    let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                    Ok(format!(
                        "{} {} {} AND {}",
                        column, keyword, low_token, high_token
                    ))
                }
                Some(_) => Err(CloakError::UnsupportedPredicate {
                    message: format!(
                        "BETWEEN is not supported on encrypted column {}.{}",
                        table, column
                    ),
                }),
            },
            Condition::IsNull { column, negated } => {
                // NULL is stored as NULL; the test stays faithful.
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("{} {}", column, keyword))
            }
            Condition::Raw(text) => {
                for bound in self.rule.bound_columns(table) {
                    if token::mentions_identifier(text, bound) {
                        return Err(CloakError::UnsupportedPredicate {
                            message: format!(
                                "cannot analyze predicate '{}' referencing encrypted column {}.{}",
                                text, table, bound
                            ),
                        });
                    }
                }
                cursor.take(count_placeholders(text), out_params)?;
                Ok(text.clone())
            }
        }
    }

    /// Encode a plaintext for equality comparison, returning the target
    /// column and the encoded value
    fn encode_comparable(
        &self,
        binding: &ColumnBinding,
        plaintext: &SqlValue,
    ) -> CloakResult<(String, SqlValue)> {
        if let Some(assisted) = self.rule.assisted_for(binding)? {
            let target = binding
                .assist_column
                .clone()
                .unwrap_or_else(|| binding.column.clone());
            if plaintext.is_null() {
                return Ok((target, SqlValue::Null));
            }
            return Ok((target, assisted.assist_value(plaintext)?));
        }

        let encryptor = self.rule.encryptor_for(binding)?;
        if plaintext.is_null() {
            return Ok((binding.column.clone(), SqlValue::Null));
        }
        if !encryptor.is_deterministic() {
            return Err(CloakError::UnsupportedPredicate {
                message: format!(
                    "equality on {}.{} requires deterministic encryption or an assist encryptor",
                    binding.table, binding.column
                ),
            });
        }
        Ok((
            binding.column.clone(),
            encryptor.encryptor().encrypt(plaintext)?,
        ))
    }
}

/// Render a value site that is not bound to an encrypted column
///
/// Placeholders consume and forward their caller parameter; literal and
/// expression text passes through unchanged, forwarding any placeholders it
/// contains.
fn render_unbound(
    item: &ValueItem,
    cursor: &mut ParamCursor<'_>,
    out_params: &mut Vec<SqlValue>,
) -> CloakResult<String> {
    match &item.parsed {
        Some(ParsedValue::Placeholder) => {
            let value = cursor.next()?;
            out_params.push(value);
            Ok("?".to_string())
        }
        Some(ParsedValue::Literal(_)) => Ok(item.raw.clone()),
        None => {
            cursor.take(count_placeholders(&item.raw), out_params)?;
            Ok(item.raw.clone())
        }
    }
}
