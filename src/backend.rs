//! Collaborator contract for the real database underneath the layer
//!
//! The encryption layer never talks to a concrete database driver; it
//! delegates to these traits. Errors cross the seam as boxed trait objects
//! and are surfaced to callers unchanged, so the underlying system's
//! failure semantics are preserved.

use crate::error::BackendError;
use crate::value::SqlValue;

/// A provider of real database connections
pub trait Backend {
    /// Connection type produced by this provider
    type Conn: BackendConnection;

    /// Obtain a new real connection
    fn connection(&self) -> Result<Self::Conn, BackendError>;
}

/// A single real database connection
///
/// Not required to be thread-safe; the wrapping layer serializes access.
pub trait BackendConnection {
    /// Row stream type produced by queries
    type Rows: BackendRows;

    /// Execute a data-modifying or DDL statement, returning affected rows
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BackendError>;

    /// Execute a query, returning its row stream
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Self::Rows, BackendError>;

    /// Release the connection
    fn close(&mut self) -> Result<(), BackendError>;
}

/// A forward-only stream of result rows
pub trait BackendRows {
    /// Column names of the result, in select order
    fn columns(&self) -> &[String];

    /// Fetch the next row, or `None` when exhausted
    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, BackendError>;
}
