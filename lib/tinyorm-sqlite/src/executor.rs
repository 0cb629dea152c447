//! SQLite implementation of Connection.

use std::ops::Deref;
use std::time::Instant;

use rusqlite::{ErrorCode, OpenFlags, params_from_iter};
use tinyorm::{Connection, Cursor, DbError, OrmError, Query, StatementOptions, Value};
use tracing::{debug, trace};

use crate::ConnectionConfig;
use crate::value::{bind, load};

/// Virtual machine instructions between deadline checks.
const PROGRESS_OPS: i32 = 1_000;

/// Wrapper around rusqlite::Connection that implements Connection.
#[derive(Debug)]
pub struct SqliteConnection(rusqlite::Connection);

impl SqliteConnection {
    /// Create a new SqliteConnection from a rusqlite Connection.
    pub fn new(connection: rusqlite::Connection) -> Self {
        Self(connection)
    }

    /// Open a SQLite database.
    pub fn open(config: impl Into<ConnectionConfig>) -> Result<Self, DbError> {
        let config = config.into();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection =
            rusqlite::Connection::open_with_flags(config.uri(), flags).map_err(db_error)?;
        debug!(?config, "opened sqlite connection");
        Ok(Self(connection))
    }

    /// Get the inner rusqlite::Connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.0
    }

    /// Run `f` with the statement timeout armed, if there is one.
    ///
    /// SQLite has no per-statement timeout; a progress handler interrupts the
    /// running statement once the deadline has passed.
    fn with_deadline<R>(&self, options: &StatementOptions, f: impl FnOnce() -> R) -> R {
        let Some(timeout) = options.timeout else {
            return f();
        };
        let deadline = Instant::now() + timeout;
        trace!(?timeout, "arming statement deadline");
        self.0
            .progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        let result = f();
        self.0.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);
        result
    }
}

impl Deref for SqliteConnection {
    type Target = rusqlite::Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Map a rusqlite error, keeping interrupts recognizable as timeouts.
fn db_error(e: rusqlite::Error) -> DbError {
    match e.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => DbError::Timeout,
        _ => DbError::backend(e),
    }
}

struct SqliteCursor<'s> {
    columns: Vec<String>,
    rows: rusqlite::Rows<'s>,
}

impl Cursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError> {
        let width = self.columns.len();
        match self.rows.next().map_err(db_error)? {
            Some(row) => (0..width)
                .map(|index| row.get_ref(index).map_err(db_error).and_then(load))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            None => Ok(None),
        }
    }
}

impl Connection for SqliteConnection {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn execute(&mut self, query: &Query, options: &StatementOptions) -> Result<u64, DbError> {
        let params = bind(&query.params)?;
        self.with_deadline(options, || {
            let mut statement = self.0.prepare_cached(&query.sql).map_err(db_error)?;
            let affected = statement
                .execute(params_from_iter(params.iter()))
                .map_err(db_error)?;
            Ok(affected as u64)
        })
    }

    fn query(
        &mut self,
        query: &Query,
        options: &StatementOptions,
        consume: &mut dyn FnMut(&mut dyn Cursor) -> Result<(), OrmError>,
    ) -> Result<(), OrmError> {
        let params = bind(&query.params).map_err(|e| e.at(query))?;
        self.with_deadline(options, || {
            let mut statement = self
                .0
                .prepare_cached(&query.sql)
                .map_err(|e| db_error(e).at(query))?;
            let columns = statement
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let rows = statement
                .query(params_from_iter(params.iter()))
                .map_err(|e| db_error(e).at(query))?;
            consume(&mut SqliteCursor { columns, rows })
        })
    }

    fn last_insert_id(&mut self) -> Result<i64, DbError> {
        Ok(self.0.last_insert_rowid())
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.0.execute_batch("BEGIN").map_err(db_error)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.0.execute_batch("COMMIT").map_err(db_error)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.0.execute_batch("ROLLBACK").map_err(db_error)
    }

    fn in_transaction(&self) -> bool {
        !self.0.is_autocommit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> SqliteConnection {
        let connection = SqliteConnection::open(":memory:").unwrap();
        connection
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        connection
    }

    #[test]
    fn quotes_identifiers() {
        let connection = connection();
        assert_eq!(connection.quote_identifier("name"), "\"name\"");
        assert_eq!(connection.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn execute_reports_affected_rows_and_rowid() {
        let mut connection = connection();
        let options = StatementOptions::default();
        let insert = Query::with("INSERT INTO t (name) VALUES (?)", ["a"]);
        assert_eq!(connection.execute(&insert, &options).unwrap(), 1);
        assert_eq!(connection.execute(&insert, &options).unwrap(), 1);
        assert_eq!(connection.last_insert_id().unwrap(), 2);
        let update = Query::new("UPDATE t SET name = 'b'", vec![]);
        assert_eq!(connection.execute(&update, &options).unwrap(), 2);
    }

    #[test]
    fn query_hands_out_labels_and_rows() {
        let mut connection = connection();
        let options = StatementOptions::default();
        connection
            .execute(&Query::with("INSERT INTO t (name) VALUES (?)", ["x"]), &options)
            .unwrap();

        let select = Query::new("SELECT id, name AS label FROM t", vec![]);
        let mut seen = Vec::new();
        connection
            .query(&select, &options, &mut |cursor: &mut dyn Cursor| {
                seen.push(cursor.columns().to_vec());
                while let Some(row) = cursor.next_row().map_err(|e| e.at(&select))? {
                    seen.push(row.iter().map(|v| format!("{v:?}")).collect());
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                vec!["id".to_string(), "label".to_string()],
                vec!["Int(1)".to_string(), "Text(\"x\")".to_string()],
            ]
        );
    }

    #[test]
    fn transaction_state_follows_autocommit() {
        let mut connection = connection();
        assert!(!connection.in_transaction());
        connection.begin().unwrap();
        assert!(connection.in_transaction());
        connection.rollback().unwrap();
        assert!(!connection.in_transaction());
    }
}
