//! The contract between the ORM and a database backend.

use std::time::Duration;

use crate::{DbError, OrmError, Query, Value};

/// Per-statement settings applied by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementOptions {
    pub timeout: Option<Duration>,
}

/// A forward-only result cursor.
pub trait Cursor {
    /// Result column labels, post-alias, in SELECT order.
    fn columns(&self) -> &[String];

    /// The next row's values by position, `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError>;
}

/// Trait for executing statements against a database backend.
///
/// Implemented by backend connection types (e.g. `SqliteConnection`). Every
/// call blocks until the backend is done.
pub trait Connection {
    /// Quote a table or column name for this dialect.
    fn quote_identifier(&self, name: &str) -> String;

    /// Execute a statement that returns no rows and report the affected row count.
    fn execute(&mut self, query: &Query, options: &StatementOptions) -> Result<u64, DbError>;

    /// Execute a query and hand its cursor to `consume`.
    ///
    /// The prepared statement and cursor live only for the duration of the
    /// call: they are released when `consume` returns, whether it read every
    /// row or stopped early. Backend failures are reported through
    /// [`DbError::at`] so they carry the statement.
    fn query(
        &mut self,
        query: &Query,
        options: &StatementOptions,
        consume: &mut dyn FnMut(&mut dyn Cursor) -> Result<(), OrmError>,
    ) -> Result<(), OrmError>;

    /// The identity generated by the last successful insert on this connection.
    fn last_insert_id(&mut self) -> Result<i64, DbError>;

    /// Begin a transaction.
    fn begin(&mut self) -> Result<(), DbError>;

    /// Commit the transaction.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Rollback the transaction.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;
}
