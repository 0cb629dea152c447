use std::sync::Arc;

use crate::query::{self, SelectParts};
use crate::stream::{fetch_rows, stream_rows};
use crate::{
    ConfigError, Connection, Entity, FieldValue, Orm, OrmError, Query, Rows, TableMeta, Value,
};

/// A SELECT over one mapped table.
pub struct Select<'o, C, T> {
    orm: &'o mut Orm<C>,
    meta: Result<Arc<TableMeta<T>>, ConfigError>,
    parts: SelectParts,
    force_write: bool,
    error: Option<OrmError>,
}

impl<'o, C: Connection, T: Entity> Select<'o, C, T> {
    pub(crate) fn new(orm: &'o mut Orm<C>, meta: Result<Arc<TableMeta<T>>, ConfigError>) -> Self {
        Self {
            orm,
            meta,
            parts: SelectParts::default(),
            force_write: false,
            error: None,
        }
    }

    /// Add a condition. Conditions are AND-combined in the order added.
    pub fn r#where<I>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.parts.conditions.push(Query::with(sql, params));
        self
    }

    /// Add a condition without parameters.
    pub fn where_sql(mut self, sql: impl Into<String>) -> Self {
        self.parts.conditions.push(Query::new(sql, Vec::new()));
        self
    }

    /// `<column>=?` with the value deflated the way the column stores it.
    pub fn eq<F: FieldValue>(mut self, column: &str, value: F) -> Self {
        if self.error.is_some() {
            return self;
        }
        match eq_condition(self.orm, &self.meta, column, &value) {
            Ok(condition) => self.parts.conditions.push(condition),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Add an ORDER BY expression, such as `"id DESC"`.
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.parts.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.parts.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.parts.offset = Some(offset);
        self
    }

    pub fn for_update(mut self) -> Self {
        self.parts.for_update = true;
        self
    }

    /// Read from the write connection even when a read connection exists.
    pub fn force_write(mut self) -> Self {
        self.force_write = true;
        self
    }

    /// Replace `*` with a column list, for instance to add computed aliases.
    pub fn columns(mut self, expr: impl Into<String>) -> Self {
        self.parts.columns = Some(expr.into());
        self
    }

    pub fn build_query(self) -> Result<Query, OrmError> {
        let (_, _, query, _) = self.prepare()?;
        Ok(query)
    }

    fn prepare(mut self) -> Result<(&'o mut Orm<C>, Arc<TableMeta<T>>, Query, bool), OrmError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let meta = self.meta?;
        let query = query::render_select(
            &|name: &str| self.orm.quote(name),
            meta.name(),
            &self.parts,
        );
        Ok((self.orm, meta, query, self.force_write))
    }

    /// The first matching row.
    pub fn single(mut self) -> Result<Option<T>, OrmError> {
        self.parts.limit = Some(1);
        Ok(self.list()?.into_iter().next())
    }

    pub fn list(self) -> Result<Vec<T>, OrmError> {
        let (orm, meta, query, force_write) = self.prepare()?;
        let options = orm.options();
        fetch_rows(orm.route_read(force_write), &meta, &query, &options)
    }

    /// One page of at most `entries_per_page` rows.
    ///
    /// Asks for one row more than the page holds; getting it back means there
    /// is a next page.
    pub fn paginate(mut self, entries_per_page: u64) -> Result<Paginated<T>, OrmError> {
        self.parts.limit = Some(entries_per_page.saturating_add(1));
        let mut rows = self.list()?;
        let has_next_page = rows.len() as u64 > entries_per_page;
        rows.truncate(usize::try_from(entries_per_page).unwrap_or(usize::MAX));
        Ok(Paginated {
            rows,
            entries_per_page,
            has_next_page,
        })
    }

    /// Hand the matching rows to `f` one at a time.
    pub fn stream<R, F>(self, f: F) -> Result<R, OrmError>
    where
        F: FnOnce(Rows<'_, T>) -> Result<R, OrmError>,
    {
        let (orm, meta, query, force_write) = self.prepare()?;
        let options = orm.options();
        stream_rows(orm.route_read(force_write), &meta, &query, &options, f)
    }
}

pub(crate) fn eq_condition<C: Connection, T, F: FieldValue>(
    orm: &Orm<C>,
    meta: &Result<Arc<TableMeta<T>>, ConfigError>,
    column: &str,
    value: &F,
) -> Result<Query, OrmError> {
    let meta = meta.as_ref().map_err(|e| OrmError::Config(e.clone()))?;
    let value = meta.field_value(column, value)?;
    let value = meta.deflate(column, value)?;
    Ok(Query::new(format!("{}=?", orm.quote(column)), vec![value]))
}

/// One page of a paginated select.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    rows: Vec<T>,
    entries_per_page: u64,
    has_next_page: bool,
}

impl<T> Paginated<T> {
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    pub fn entries_per_page(&self) -> u64 {
        self.entries_per_page
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T> IntoIterator for Paginated<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
