//! The executor-facing context: connections, registry and configuration.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::query::{self, SelectParts};
use crate::stream::{fetch_i64, fetch_rows};
use crate::{
    ConfigError, Connection, Count, Delete, Entity, Insert, OrmConfig, OrmError, Query, Registry,
    Select, StatementOptions, TableMeta, Update, Value,
};

/// Entry point for every statement.
///
/// Owns the write connection and, optionally, a read connection (a replica).
/// Reads go to the read connection unless a statement forces the write
/// connection or a transaction is open on it; everything else uses the write
/// connection.
pub struct Orm<C> {
    registry: Arc<Registry>,
    config: OrmConfig,
    write: C,
    read: Option<C>,
}

impl<C: Connection> Orm<C> {
    pub fn new(connection: C) -> Self {
        Self::with_registry(Arc::new(Registry::new()), connection)
    }

    /// Share table metadata with other contexts.
    pub fn with_registry(registry: Arc<Registry>, connection: C) -> Self {
        Self {
            registry,
            config: OrmConfig::default(),
            write: connection,
            read: None,
        }
    }

    pub fn with_read_connection(mut self, connection: C) -> Self {
        self.read = Some(connection);
        self
    }

    pub fn with_config(mut self, config: OrmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn write_connection(&mut self) -> &mut C {
        &mut self.write
    }

    pub fn read_connection(&mut self) -> Option<&mut C> {
        self.read.as_mut()
    }

    pub fn table<T: Entity>(&self) -> Result<Arc<TableMeta<T>>, ConfigError> {
        self.registry.table::<T>()
    }

    pub(crate) fn quote(&self, name: &str) -> String {
        self.write.quote_identifier(name)
    }

    pub(crate) fn options(&self) -> StatementOptions {
        StatementOptions {
            timeout: self.config.query_timeout,
        }
    }

    /// The connection a read goes to.
    pub(crate) fn route_read(&mut self, force_write: bool) -> &mut C {
        let in_transaction = self.write.in_transaction();
        match &mut self.read {
            Some(read) if !force_write && !in_transaction => {
                trace!("routing read to read connection");
                read
            }
            _ => {
                trace!(force_write, in_transaction, "routing read to write connection");
                &mut self.write
            }
        }
    }

    pub(crate) fn execute_write(&mut self, table: &str, query: &Query) -> Result<u64, OrmError> {
        debug!(
            table = %table,
            sql = %query.sql,
            param_count = query.params.len(),
            "executing statement"
        );
        let options = self.options();
        self.write
            .execute(query, &options)
            .map_err(|e| e.at(query))
    }

    pub fn select<T: Entity>(&mut self) -> Select<'_, C, T> {
        let meta = self.table::<T>();
        Select::new(self, meta)
    }

    pub fn count<T: Entity>(&mut self) -> Count<'_, C, T> {
        let meta = self.table::<T>();
        Count::new(self, meta)
    }

    pub fn insert<T: Entity>(&mut self) -> Insert<'_, C, T> {
        let meta = self.table::<T>();
        Insert::new(self, meta)
    }

    /// An insert of every column of `row`. Primary keys that are null or zero
    /// are left out so the database assigns them.
    pub fn insert_row<T: Entity>(&mut self, row: &T) -> Insert<'_, C, T> {
        let meta = self.table::<T>();
        Insert::from_row(self, meta, row)
    }

    /// An update of `row`, identified by its current primary key.
    pub fn update<'r, T: Entity>(&mut self, row: &'r T) -> Update<'_, 'r, C, T> {
        let meta = self.table::<T>();
        let allow_zero = self.config.allow_zero_primary_key;
        Update::new(self, meta, row, allow_zero)
    }

    /// A delete of `row`, identified by its current primary key.
    pub fn delete<'r, T: Entity>(&mut self, row: &'r T) -> Delete<'_, 'r, C, T> {
        let meta = self.table::<T>();
        let allow_zero = self.config.allow_zero_primary_key;
        Delete::new(self, meta, row, allow_zero)
    }

    /// Read `row` again by its primary key, from the write connection.
    pub fn refetch<T: Entity>(&mut self, row: &T) -> Result<Option<T>, OrmError> {
        let meta = self.table::<T>()?;
        let key = meta.primary_key(row, self.config.allow_zero_primary_key)?;
        self.select_by_key(meta, key)
    }

    pub(crate) fn select_by_key<T: Entity>(
        &mut self,
        meta: Arc<TableMeta<T>>,
        key: Vec<(String, Value)>,
    ) -> Result<Option<T>, OrmError> {
        let parts = SelectParts {
            conditions: query::key_conditions(&|name: &str| self.quote(name), key),
            limit: Some(1),
            ..SelectParts::default()
        };
        let query = query::render_select(&|name: &str| self.quote(name), meta.name(), &parts);
        let options = self.options();
        let mut rows = fetch_rows(&mut self.write, &meta, &query, &options)?;
        Ok(rows.pop())
    }

    /// Rows of `T` from hand-written SQL, such as a join.
    pub fn query_rows<T, I>(&mut self, sql: &str, params: I) -> Result<Vec<T>, OrmError>
    where
        T: Entity,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let meta = self.table::<T>()?;
        let query = Query::with(sql, params);
        let options = self.options();
        fetch_rows(self.route_read(false), &meta, &query, &options)
    }

    pub fn query_single<T, I>(&mut self, sql: &str, params: I) -> Result<Option<T>, OrmError>
    where
        T: Entity,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Ok(self.query_rows(sql, params)?.into_iter().next())
    }

    /// The first column of the first row as an integer.
    pub fn query_for_long<I>(&mut self, sql: &str, params: I) -> Result<Option<i64>, OrmError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let query = Query::with(sql, params);
        let options = self.options();
        fetch_i64(self.route_read(false), &query, &options)
    }

    /// Execute hand-written SQL on the write connection.
    pub fn execute_sql<I>(&mut self, sql: &str, params: I) -> Result<u64, OrmError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let query = Query::with(sql, params);
        self.execute_write("", &query)
    }

    pub fn begin(&mut self) -> Result<(), OrmError> {
        debug!("begin transaction");
        self.write
            .begin()
            .map_err(|e| e.at(&Query::new("BEGIN", vec![])))
    }

    pub fn commit(&mut self) -> Result<(), OrmError> {
        debug!("commit transaction");
        self.write
            .commit()
            .map_err(|e| e.at(&Query::new("COMMIT", vec![])))
    }

    pub fn rollback(&mut self) -> Result<(), OrmError> {
        debug!("rollback transaction");
        self.write
            .rollback()
            .map_err(|e| e.at(&Query::new("ROLLBACK", vec![])))
    }

    pub fn in_transaction(&self) -> bool {
        self.write.in_transaction()
    }

    /// Run `f` in a transaction: committed when it returns `Ok`, rolled back
    /// when it returns `Err`.
    pub fn transaction<R, F>(&mut self, f: F) -> Result<R, OrmError>
    where
        F: FnOnce(&mut Self) -> Result<R, OrmError>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl<C> std::fmt::Debug for Orm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("read_connection", &self.read.is_some())
            .finish()
    }
}
