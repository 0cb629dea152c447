//! A scripted connection for unit tests.

use std::collections::VecDeque;

use crate::{Connection, Cursor, DbError, OrmError, Query, StatementOptions, Value};

#[derive(Debug, Default)]
pub(crate) struct MockConnection {
    /// Every statement issued, in order.
    pub log: Vec<Query>,
    pub options: Vec<StatementOptions>,
    /// Results handed out to queries, front first. An exhausted queue yields
    /// an empty result.
    pub results: VecDeque<(Vec<String>, Vec<Vec<Value>>)>,
    /// Affected counts handed out to executes. Defaults to 1.
    pub affected: VecDeque<u64>,
    pub last_id: i64,
    pub in_tx: bool,
    pub fail_next: Option<DbError>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.push_result(columns, rows);
        self
    }

    pub fn push_result(&mut self, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.results.push_back((columns, rows));
    }

    pub fn sql(&self) -> Vec<&str> {
        self.log.iter().map(|q| q.sql.as_str()).collect()
    }
}

pub(crate) struct MockCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl MockCursor {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter(),
        }
    }
}

impl Cursor for MockCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError> {
        Ok(self.rows.next())
    }
}

impl Connection for MockConnection {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn execute(&mut self, query: &Query, options: &StatementOptions) -> Result<u64, DbError> {
        self.log.push(query.clone());
        self.options.push(*options);
        if let Some(e) = self.fail_next.take() {
            return Err(e);
        }
        Ok(self.affected.pop_front().unwrap_or(1))
    }

    fn query(
        &mut self,
        query: &Query,
        options: &StatementOptions,
        consume: &mut dyn FnMut(&mut dyn Cursor) -> Result<(), OrmError>,
    ) -> Result<(), OrmError> {
        self.log.push(query.clone());
        self.options.push(*options);
        if let Some(e) = self.fail_next.take() {
            return Err(e.at(query));
        }
        let (columns, rows) = self.results.pop_front().unwrap_or_default();
        let mut cursor = MockCursor {
            columns,
            rows: rows.into_iter(),
        };
        consume(&mut cursor)
    }

    fn last_insert_id(&mut self) -> Result<i64, DbError> {
        Ok(self.last_id)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.log.push(Query::new("BEGIN", vec![]));
        self.in_tx = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.log.push(Query::new("COMMIT", vec![]));
        self.in_tx = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.log.push(Query::new("ROLLBACK", vec![]));
        self.in_tx = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}
