use std::sync::Arc;

use crate::query;
use crate::select::eq_condition;
use crate::stream::fetch_i64;
use crate::{ConfigError, Connection, Entity, FieldValue, Orm, OrmError, Query, TableMeta, Value};

/// `SELECT COUNT(*)` over one mapped table.
pub struct Count<'o, C, T> {
    orm: &'o mut Orm<C>,
    meta: Result<Arc<TableMeta<T>>, ConfigError>,
    conditions: Vec<Query>,
    force_write: bool,
    error: Option<OrmError>,
}

impl<'o, C: Connection, T: Entity> Count<'o, C, T> {
    pub(crate) fn new(orm: &'o mut Orm<C>, meta: Result<Arc<TableMeta<T>>, ConfigError>) -> Self {
        Self {
            orm,
            meta,
            conditions: Vec::new(),
            force_write: false,
            error: None,
        }
    }

    pub fn r#where<I>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.conditions.push(Query::with(sql, params));
        self
    }

    pub fn where_sql(mut self, sql: impl Into<String>) -> Self {
        self.conditions.push(Query::new(sql, Vec::new()));
        self
    }

    pub fn eq<F: FieldValue>(mut self, column: &str, value: F) -> Self {
        if self.error.is_some() {
            return self;
        }
        match eq_condition(self.orm, &self.meta, column, &value) {
            Ok(condition) => self.conditions.push(condition),
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn force_write(mut self) -> Self {
        self.force_write = true;
        self
    }

    pub fn build_query(self) -> Result<Query, OrmError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let meta = self.meta?;
        Ok(query::render_count(
            &|name: &str| self.orm.quote(name),
            meta.name(),
            &self.conditions,
        ))
    }

    /// The number of matching rows; zero when nothing matches.
    pub fn execute(self) -> Result<u64, OrmError> {
        let Count {
            orm,
            meta,
            conditions,
            force_write,
            error,
        } = self;
        if let Some(e) = error {
            return Err(e);
        }
        let meta = meta?;
        let query = query::render_count(&|name: &str| orm.quote(name), meta.name(), &conditions);
        let options = orm.options();
        let count = fetch_i64(orm.route_read(force_write), &query, &options)?;
        Ok(count.map_or(0, |n| n.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use crate::TableBuilder;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Member {
        id: i64,
        name: String,
    }

    impl Entity for Member {
        fn describe(table: &mut TableBuilder<Self>) {
            table.name("member");
            table.column("id", |m: &Self| &m.id, |m| &mut m.id).primary_key();
            table.column("name", |m: &Self| &m.name, |m| &mut m.name);
            table.default_constructor();
        }
    }

    #[test]
    fn counts_with_conditions() {
        let mut orm = Orm::new(MockConnection::new());
        orm.write_connection()
            .push_result(&["COUNT(*)"], vec![vec![Value::Int(2)]]);
        let n = orm
            .count::<Member>()
            .r#where("name LIKE ?", ["m%"])
            .eq("id", 4i64)
            .execute()
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            orm.write_connection().log[0],
            Query::new(
                "SELECT COUNT(*) FROM `member` WHERE (name LIKE ?) AND (`id`=?)",
                vec![Value::from("m%"), Value::Int(4)]
            )
        );
    }

    #[test]
    fn empty_result_counts_zero() {
        let mut orm = Orm::new(MockConnection::new());
        assert_eq!(orm.count::<Member>().execute().unwrap(), 0);
    }
}
