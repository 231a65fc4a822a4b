//! The public façade: datasource and connection wrappers
//!
//! [`EncryptDataSource`] compiles and validates the rule configuration once
//! at construction, then hands out [`EncryptConnection`]s that share the
//! compiled rule by reference. Each connection wraps exactly one real
//! connection; SQL routes through the statement rewriter on the way out and
//! result rows come back wrapped in the lazy decryptor.

use crate::backend::{Backend, BackendConnection};
use crate::config::EncryptRuleConfig;
use crate::error::{CloakError, CloakResult};
use crate::result::DecryptingRows;
use crate::rewrite::statement::Projection;
use crate::rewrite::{token, RewriteResult, StatementRewriter};
use crate::rule::EncryptRule;
use crate::value::SqlValue;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

/// Behavior options for a datasource
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Log each logic SQL and its rewritten actual SQL at info level
    pub sql_show: bool,
}

impl EncryptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sql_show(mut self, sql_show: bool) -> Self {
        self.sql_show = sql_show;
        self
    }
}

/// Datasource wrapper binding a backend to a compiled encryption rule
#[derive(Debug)]
pub struct EncryptDataSource<B: Backend> {
    backend: B,
    rule: Arc<EncryptRule>,
    options: EncryptOptions,
}

impl<B: Backend> EncryptDataSource<B> {
    /// Create a datasource over a backend
    ///
    /// The rule configuration is compiled and validated here; any
    /// inconsistency fails construction and no datasource exists. The
    /// backend is stored untouched.
    pub fn new(
        backend: B,
        config: EncryptRuleConfig,
        options: EncryptOptions,
    ) -> CloakResult<Self> {
        let rule = Arc::new(EncryptRule::new(config)?);
        Ok(Self {
            backend,
            rule,
            options,
        })
    }

    /// The compiled rule shared with every connection
    pub fn rule(&self) -> &Arc<EncryptRule> {
        &self.rule
    }

    /// Obtain a real connection and bind it to the shared rule
    pub fn connection(&self) -> CloakResult<EncryptConnection<B::Conn>> {
        let conn = self.backend.connection()?;
        Ok(EncryptConnection {
            inner: Mutex::new(Some(conn)),
            rule: Arc::clone(&self.rule),
            options: self.options.clone(),
        })
    }
}

/// A connection wrapper over exactly one real connection
///
/// Not intended for concurrent statement execution; the interior lock
/// serializes access to the real connection and guards close so the real
/// connection is released exactly once.
pub struct EncryptConnection<C: BackendConnection> {
    inner: Mutex<Option<C>>,
    rule: Arc<EncryptRule>,
    options: EncryptOptions,
}

impl<C: BackendConnection> EncryptConnection<C> {
    fn guard(&self) -> MutexGuard<'_, Option<C>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log_sql(&self, logic_sql: &str, rewrite: &RewriteResult) {
        if self.options.sql_show {
            info!("Logic SQL: {}", logic_sql);
            info!("Actual SQL: {}", rewrite.sql);
        } else {
            debug!("Logic SQL: {}", logic_sql);
            debug!("Actual SQL: {}", rewrite.sql);
        }
    }

    /// Execute a data-modifying statement, returning affected rows
    pub fn execute_update(&self, sql: &str, params: &[SqlValue]) -> CloakResult<u64> {
        let rewrite = StatementRewriter::new(&self.rule).rewrite(sql, params)?;
        self.log_sql(sql, &rewrite);
        let mut guard = self.guard();
        let conn = guard.as_mut().ok_or(CloakError::ConnectionClosed)?;
        Ok(conn.execute(&rewrite.sql, &rewrite.params)?)
    }

    /// Execute a query, returning decrypting rows
    pub fn execute_query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> CloakResult<DecryptingRows<C::Rows>> {
        let rewrite = StatementRewriter::new(&self.rule).rewrite(sql, params)?;
        self.log_sql(sql, &rewrite);
        let rows = {
            let mut guard = self.guard();
            let conn = guard.as_mut().ok_or(CloakError::ConnectionClosed)?;
            conn.query(&rewrite.sql, &rewrite.params)?
        };
        let hide_assist = matches!(rewrite.projection, Some(Projection::Wildcard));
        Ok(DecryptingRows::new(
            rows,
            Arc::clone(&self.rule),
            rewrite.table,
            hide_assist,
        ))
    }

    /// Run a `;`-separated SQL script through the normal rewrite path
    ///
    /// Empty statements are skipped. Used by schema/data initialization
    /// scripts; DDL passes through the rewriter unchanged.
    pub fn execute_script(&self, script: &str) -> CloakResult<()> {
        for statement in token::split_top_level(script, ';') {
            if statement.is_empty() {
                continue;
            }
            self.execute_update(&statement, &[])?;
        }
        Ok(())
    }

    /// Close the underlying real connection
    ///
    /// Idempotent: the first call releases the real connection, later calls
    /// are no-ops.
    pub fn close(&self) -> CloakResult<()> {
        let taken = self.guard().take();
        if let Some(mut conn) = taken {
            conn.close()?;
        }
        Ok(())
    }

    /// Whether this connection has been closed
    pub fn is_closed(&self) -> bool {
        self.guard().is_none()
    }
}
