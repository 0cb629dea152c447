use std::sync::Arc;

use crate::query;
use crate::{ConfigError, Connection, Entity, Orm, OrmError, Query, TableMeta};

/// A DELETE of one row, identified by its current primary key.
pub struct Delete<'o, 'r, C, T> {
    orm: &'o mut Orm<C>,
    meta: Result<Arc<TableMeta<T>>, ConfigError>,
    row: &'r T,
    allow_zero: bool,
}

impl<'o, 'r, C: Connection, T: Entity> Delete<'o, 'r, C, T> {
    pub(crate) fn new(
        orm: &'o mut Orm<C>,
        meta: Result<Arc<TableMeta<T>>, ConfigError>,
        row: &'r T,
        allow_zero: bool,
    ) -> Self {
        Self {
            orm,
            meta,
            row,
            allow_zero,
        }
    }

    /// Accept `0` as a single integer primary key.
    pub fn allow_zero_primary_key(mut self) -> Self {
        self.allow_zero = true;
        self
    }

    fn prepare(self) -> Result<(&'o mut Orm<C>, Arc<TableMeta<T>>, Query), OrmError> {
        let meta = self.meta?;
        let key = meta.primary_key(self.row, self.allow_zero)?;
        let orm = self.orm;
        let quote = |name: &str| orm.quote(name);
        let conditions = query::key_conditions(&quote, key);
        let query = query::render_delete(&quote, meta.name(), &conditions);
        Ok((orm, meta, query))
    }

    pub fn build_query(self) -> Result<Query, OrmError> {
        Ok(self.prepare()?.2)
    }

    /// Delete the row. Exactly one row must be affected.
    pub fn execute(self) -> Result<(), OrmError> {
        let (orm, meta, query) = self.prepare()?;
        let affected = orm.execute_write(meta.name(), &query)?;
        if affected != 1 {
            return Err(OrmError::row_count(&query, 1, affected));
        }
        Ok(())
    }
}
