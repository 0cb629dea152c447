//! Row-at-a-time result mapping.

use tracing::debug;

use crate::{
    Connection, Cursor, Entity, OrmError, Query, StatementOptions, TableMeta, Value, ValueError,
};

/// A forward-only sequence of mapped rows over an open cursor.
///
/// Each row is inflated and constructed as it is pulled. The iterator is
/// fused: after the first error (or the end of the result) it yields nothing.
/// It cannot outlive the [`crate::Select::stream`] closure it was handed to,
/// and the statement behind it is released when that closure returns.
pub struct Rows<'c, T> {
    cursor: &'c mut dyn Cursor,
    meta: &'c TableMeta<T>,
    query: &'c Query,
    labels: Vec<String>,
    done: bool,
}

impl<T> Rows<'_, T> {
    /// Result column labels, in SELECT order.
    pub fn columns(&self) -> &[String] {
        &self.labels
    }
}

impl<T> Iterator for Rows<'_, T> {
    type Item = Result<T, OrmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.cursor.next_row() {
            Ok(Some(values)) => Some(self.meta.materialize(&self.labels, values)),
            Ok(None) => None,
            Err(e) => Some(Err(e.at(self.query))),
        };
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Run `query` and hand its mapped rows to `f`.
pub(crate) fn stream_rows<C, T, R, F>(
    connection: &mut C,
    meta: &TableMeta<T>,
    query: &Query,
    options: &StatementOptions,
    f: F,
) -> Result<R, OrmError>
where
    C: Connection + ?Sized,
    T: Entity,
    F: FnOnce(Rows<'_, T>) -> Result<R, OrmError>,
{
    debug!(
        table = %meta.name(),
        sql = %query.sql,
        param_count = query.params.len(),
        "executing query"
    );

    let mut f = Some(f);
    let mut out = None;
    connection.query(query, options, &mut |cursor: &mut dyn Cursor| {
        if let Some(f) = f.take() {
            let labels = cursor.columns().to_vec();
            let rows = Rows {
                cursor,
                meta,
                query,
                labels,
                done: false,
            };
            out = Some(f(rows)?);
        }
        Ok(())
    })?;

    out.ok_or_else(|| OrmError::NotFound(format!("no result set for {}", query.sql)))
}

pub(crate) fn fetch_rows<C, T>(
    connection: &mut C,
    meta: &TableMeta<T>,
    query: &Query,
    options: &StatementOptions,
) -> Result<Vec<T>, OrmError>
where
    C: Connection + ?Sized,
    T: Entity,
{
    stream_rows(connection, meta, query, options, |rows| rows.collect())
}

/// The first column of the first row as an integer, `None` when the result is
/// empty or the value is null.
pub(crate) fn fetch_i64<C>(
    connection: &mut C,
    query: &Query,
    options: &StatementOptions,
) -> Result<Option<i64>, OrmError>
where
    C: Connection + ?Sized,
{
    debug!(sql = %query.sql, param_count = query.params.len(), "executing scalar query");

    let mut out = None;
    connection.query(query, options, &mut |cursor: &mut dyn Cursor| {
        let label = cursor.columns().first().cloned().unwrap_or_default();
        let row = cursor.next_row().map_err(|e| e.at(query))?;
        out = match row.and_then(|values| values.into_iter().next()) {
            None | Some(Value::Null) => None,
            Some(Value::Int(n)) => Some(n),
            Some(other) => {
                return Err(OrmError::Construct {
                    type_name: "i64",
                    parameter: label,
                    source: ValueError::mismatch("i64", &other),
                });
            }
        };
        Ok(())
    })?;
    Ok(out)
}
