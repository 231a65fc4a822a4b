//! Result decryption: lazy plaintext views over backend rows
//!
//! [`DecryptingRows`] wraps the row stream returned by the real connection.
//! Values of encrypted columns are decoded one at a time, at the point of
//! access — a row fetch never decrypts anything, and a value that fails to
//! decode surfaces its error exactly at that column read. Assist columns
//! are internal storage: a wildcard projection hides them; selecting one by
//! name returns its stored scalar undecoded.

use crate::backend::BackendRows;
use crate::encryptor::Encryptor as _;
use crate::error::CloakResult;
use crate::rule::EncryptRule;
use crate::value::SqlValue;
use std::sync::Arc;

/// Per-column read metadata
#[derive(Debug)]
struct ColumnMeta {
    /// Column name as reported by the backend
    name: String,
    /// Index into the raw backend row
    raw_index: usize,
    /// Whether reads of this column decode through the rule
    decode: bool,
}

#[derive(Debug)]
struct RowsMeta {
    columns: Vec<ColumnMeta>,
    rule: Arc<EncryptRule>,
    table: Option<String>,
}

/// A decrypting wrapper over a backend row stream
#[derive(Debug)]
pub struct DecryptingRows<R: BackendRows> {
    inner: R,
    meta: Arc<RowsMeta>,
    visible_names: Vec<String>,
}

impl<R: BackendRows> DecryptingRows<R> {
    /// Wrap a backend row stream
    ///
    /// `hide_assist` is set for wildcard projections, where assist columns
    /// are filtered out of the visible set.
    pub(crate) fn new(
        inner: R,
        rule: Arc<EncryptRule>,
        table: Option<String>,
        hide_assist: bool,
    ) -> Self {
        let mut columns = Vec::new();
        for (raw_index, name) in inner.columns().iter().enumerate() {
            let (is_assist, decode) = match &table {
                Some(table) => (
                    rule.is_assist_column(table, name),
                    rule.resolve(table, name).is_some(),
                ),
                None => (false, false),
            };
            if hide_assist && is_assist {
                continue;
            }
            columns.push(ColumnMeta {
                name: name.clone(),
                raw_index,
                decode,
            });
        }
        let visible_names = columns.iter().map(|c| c.name.clone()).collect();
        Self {
            inner,
            meta: Arc::new(RowsMeta {
                columns,
                rule,
                table,
            }),
            visible_names,
        }
    }

    /// Visible column names, in select order
    pub fn columns(&self) -> &[String] {
        &self.visible_names
    }

    /// Fetch the next row, or `None` when the stream is exhausted
    ///
    /// Fetching performs no decoding; values decode at [`Row::get`].
    pub fn next(&mut self) -> CloakResult<Option<Row>> {
        match self.inner.next_row()? {
            Some(raw) => Ok(Some(Row {
                meta: Arc::clone(&self.meta),
                raw,
            })),
            None => Ok(None),
        }
    }
}

/// One result row with lazy per-column decoding
pub struct Row {
    meta: Arc<RowsMeta>,
    raw: Vec<SqlValue>,
}

impl Row {
    /// Read a column by name (case-insensitive)
    ///
    /// Returns `Null` for missing columns' stored NULLs as-is; a stored
    /// value of an encrypted column that fails to decode raises the crypto
    /// error here, at the read.
    pub fn get(&self, column: &str) -> CloakResult<Option<SqlValue>> {
        let meta = self
            .meta
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column));
        match meta {
            None => Ok(None),
            Some(meta) => self.read(meta).map(Some),
        }
    }

    /// Read a column by its visible index
    pub fn get_at(&self, index: usize) -> CloakResult<Option<SqlValue>> {
        match self.meta.columns.get(index) {
            None => Ok(None),
            Some(meta) => self.read(meta).map(Some),
        }
    }

    fn read(&self, meta: &ColumnMeta) -> CloakResult<SqlValue> {
        let stored = self
            .raw
            .get(meta.raw_index)
            .cloned()
            .unwrap_or(SqlValue::Null);
        if !meta.decode || stored.is_null() {
            return Ok(stored);
        }
        // The decode flag implies table and binding exist.
        let table = self.meta.table.as_deref().unwrap_or_default();
        let binding = match self.meta.rule.resolve(table, &meta.name) {
            Some(binding) => binding,
            None => return Ok(stored),
        };
        let encryptor = self.meta.rule.encryptor_for(binding)?;
        Ok(encryptor.encryptor().decrypt(&stored)?)
    }
}
