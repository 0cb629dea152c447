use std::sync::Arc;

use indexmap::IndexMap;

use crate::assign::{Assignments, assign};
use crate::query;
use crate::{ConfigError, Connection, Entity, FieldValue, Orm, OrmError, Query, TableMeta, Value};

/// An INSERT of one row.
pub struct Insert<'o, C, T> {
    orm: &'o mut Orm<C>,
    meta: Result<Arc<TableMeta<T>>, ConfigError>,
    values: IndexMap<String, Value>,
    on_duplicate: Vec<Query>,
    error: Option<OrmError>,
}

struct Prepared<'o, C, T> {
    orm: &'o mut Orm<C>,
    meta: Arc<TableMeta<T>>,
    values: IndexMap<String, Value>,
    query: Query,
    on_duplicate: bool,
}

impl<'o, C: Connection, T: Entity> Insert<'o, C, T> {
    pub(crate) fn new(orm: &'o mut Orm<C>, meta: Result<Arc<TableMeta<T>>, ConfigError>) -> Self {
        Self {
            orm,
            meta,
            values: IndexMap::new(),
            on_duplicate: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn from_row(
        orm: &'o mut Orm<C>,
        meta: Result<Arc<TableMeta<T>>, ConfigError>,
        row: &T,
    ) -> Self {
        let mut insert = Self::new(orm, meta);
        if let Ok(meta) = &insert.meta {
            let meta = Arc::clone(meta);
            for column in meta.columns() {
                let value = match meta.read_deflated(row, column) {
                    Ok(value) => value,
                    Err(e) => {
                        insert.error = Some(e);
                        break;
                    }
                };
                if column.is_primary_key() && (value.is_null() || value == Value::Int(0)) {
                    continue;
                }
                insert.values.insert(column.name().to_string(), value);
            }
        }
        insert
    }

    /// Set a column. Setting it again replaces the value and moves the column
    /// to the end of the column list.
    pub fn value<F: FieldValue>(mut self, column: &str, value: F) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Ok(meta) = self.meta.as_deref() {
            let result = meta
                .field_value(column, &value)
                .and_then(|value| assign(meta, None, &mut self.values, column, value));
            if let Err(e) = result {
                self.error = Some(e);
            }
        }
        self
    }

    /// Append an `ON DUPLICATE KEY UPDATE` clause. Several clauses are
    /// comma-joined in the order added.
    pub fn on_duplicate_key_update<I>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.on_duplicate.push(Query::with(sql, params));
        self
    }

    fn prepare(self) -> Result<Prepared<'o, C, T>, OrmError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let meta = self.meta?;
        let mut values = self.values;
        meta.run_before_insert(&mut Assignments::new(&meta, None, &mut values))?;

        let pairs: Vec<(String, Value)> = values
            .iter()
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        let orm = self.orm;
        let query = query::render_insert(
            &|name: &str| orm.quote(name),
            meta.name(),
            &pairs,
            &self.on_duplicate,
        );
        Ok(Prepared {
            orm,
            meta,
            values,
            query,
            on_duplicate: !self.on_duplicate.is_empty(),
        })
    }

    /// Render the statement, before-insert hooks included.
    pub fn build_query(self) -> Result<Query, OrmError> {
        Ok(self.prepare()?.query)
    }

    /// Insert and report the affected row count.
    ///
    /// Without an `ON DUPLICATE KEY UPDATE` clause exactly one row must be
    /// affected. With one, the count is the database's to define.
    pub fn execute(self) -> Result<u64, OrmError> {
        let prepared = self.prepare()?;
        let affected = prepared
            .orm
            .execute_write(prepared.meta.name(), &prepared.query)?;
        if !prepared.on_duplicate && affected != 1 {
            return Err(OrmError::row_count(&prepared.query, 1, affected));
        }
        Ok(affected)
    }

    /// Insert, then read the row back by its primary key.
    ///
    /// A single primary key left unset is taken from the connection's last
    /// insert id.
    pub fn execute_select(self) -> Result<T, OrmError> {
        let Prepared {
            orm,
            meta,
            values,
            query,
            on_duplicate,
        } = self.prepare()?;

        let key_columns: Vec<String> = meta.primary_keys().map(|c| c.name().to_string()).collect();
        if key_columns.is_empty() {
            return Err(OrmError::MissingPrimaryKey {
                table: meta.name().to_string(),
            });
        }

        let affected = orm.execute_write(meta.name(), &query)?;
        if !on_duplicate && affected != 1 {
            return Err(OrmError::row_count(&query, 1, affected));
        }

        let mut key = Vec::with_capacity(key_columns.len());
        for column in &key_columns {
            let value = match values.get(column) {
                Some(value) if !value.is_null() => value.clone(),
                _ if key_columns.len() == 1 => orm
                    .write_connection()
                    .last_insert_id()
                    .map(Value::Int)
                    .map_err(|e| e.at(&query))?,
                _ => {
                    return Err(OrmError::InvalidPrimaryKey {
                        table: meta.name().to_string(),
                        column: column.clone(),
                        value: Value::Null,
                    });
                }
            };
            key.push((column.clone(), value));
        }

        let table = meta.name().to_string();
        orm.select_by_key(meta, key)?
            .ok_or_else(|| OrmError::NotFound(format!("{table}: inserted row")))
    }
}
