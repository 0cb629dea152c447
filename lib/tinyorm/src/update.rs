use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

use crate::assign::{Assignments, assign};
use crate::query;
use crate::{ConfigError, Connection, Entity, FieldValue, Orm, OrmError, Query, TableMeta, Value};

/// An UPDATE of one row, identified by its current primary key.
///
/// Only columns whose new deflated value differs from the row's current one
/// are written. With nothing to write, `execute` issues no SQL.
pub struct Update<'o, 'r, C, T> {
    orm: &'o mut Orm<C>,
    meta: Result<Arc<TableMeta<T>>, ConfigError>,
    row: &'r T,
    values: IndexMap<String, Value>,
    allow_zero: bool,
    error: Option<OrmError>,
}

impl<'o, 'r, C: Connection, T: Entity> Update<'o, 'r, C, T> {
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
            values: IndexMap::new(),
            allow_zero,
            error: None,
        }
    }

    pub fn set<F: FieldValue>(mut self, column: &str, value: F) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Ok(meta) = self.meta.as_deref() {
            let result = meta.field_value(column, &value).and_then(|value| {
                assign(meta, Some(self.row), &mut self.values, column, value)
            });
            if let Err(e) = result {
                self.error = Some(e);
            }
        }
        self
    }

    /// Set every column whose value on `new` differs from the current row.
    pub fn set_row(mut self, new: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Ok(meta) = self.meta.as_deref() {
            let result = meta.columns().try_for_each(|column| {
                let value = meta.read(new, column)?;
                assign(meta, Some(self.row), &mut self.values, column.name(), value)
            });
            if let Err(e) = result {
                self.error = Some(e);
            }
        }
        self
    }

    /// Accept `0` as a single integer primary key.
    pub fn allow_zero_primary_key(mut self) -> Self {
        self.allow_zero = true;
        self
    }

    /// Columns with a pending change, before hooks run.
    pub fn pending_columns(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    fn prepare(self) -> Result<(&'o mut Orm<C>, Arc<TableMeta<T>>, Option<Query>), OrmError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let meta = self.meta?;
        let key = meta.primary_key(self.row, self.allow_zero)?;

        let mut values = self.values;
        if values.is_empty() {
            return Ok((self.orm, meta, None));
        }
        meta.run_before_update(&mut Assignments::new(&meta, Some(self.row), &mut values))?;
        if values.is_empty() {
            return Ok((self.orm, meta, None));
        }

        let pairs: Vec<(String, Value)> = values.into_iter().collect();
        let orm = self.orm;
        let quote = |name: &str| orm.quote(name);
        let conditions = query::key_conditions(&quote, key);
        let query = query::render_update(&quote, meta.name(), &pairs, &conditions);
        Ok((orm, meta, Some(query)))
    }

    /// Render the statement, before-update hooks included. `None` when there
    /// is nothing to write.
    pub fn build_query(self) -> Result<Option<Query>, OrmError> {
        Ok(self.prepare()?.2)
    }

    /// Write the changes and report the affected row count, `0` when there
    /// was nothing to write.
    pub fn execute(self) -> Result<u64, OrmError> {
        let (orm, meta, query) = self.prepare()?;
        let Some(query) = query else {
            info!(table = %meta.name(), "no modification, update skipped");
            return Ok(0);
        };
        let affected = orm.execute_write(meta.name(), &query)?;
        if affected != 1 {
            return Err(OrmError::row_count(&query, 1, affected));
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    use crate::testing::MockConnection;
    use crate::{ExtraColumns, TableBuilder};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Member {
        id: i64,
        name: String,
        tags: Vec<String>,
        updated_at: Option<NaiveDateTime>,
        extra: ExtraColumns,
    }

    impl Entity for Member {
        fn describe(table: &mut TableBuilder<Self>) {
            table.name("member");
            table.column("id", |m: &Self| &m.id, |m| &mut m.id).primary_key();
            table.column("name", |m: &Self| &m.name, |m| &mut m.name);
            table.column("tags", |m: &Self| &m.tags, |m| &mut m.tags);
            table
                .column("updated_at", |m: &Self| &m.updated_at, |m| &mut m.updated_at)
                .updated_at();
            table.extra_columns(|m: &mut Self| &mut m.extra);
            table.default_constructor();
        }
    }

    fn john() -> Member {
        Member {
            id: 1,
            name: "John".into(),
            tags: vec!["a".into(), "b".into()],
            ..Member::default()
        }
    }

    #[test]
    fn unchanged_values_issue_no_sql() {
        let mut orm = Orm::new(MockConnection::new());
        let row = john();
        let affected = orm
            .update(&row)
            .set("name", "John".to_string())
            .set("tags", vec!["a".to_string(), "b".to_string()])
            .execute()
            .unwrap();
        assert_eq!(affected, 0);
        assert!(orm.write_connection().log.is_empty());
    }

    #[test]
    fn changed_values_render_with_key_and_timestamp() {
        let mut orm = Orm::new(MockConnection::new());
        let row = john();
        let update = orm.update(&row).set("name", "Jon".to_string());
        assert_eq!(update.pending_columns(), vec!["name"]);
        let query = update.build_query().unwrap().unwrap();
        assert_eq!(
            query.sql,
            "UPDATE `member` SET `name`=?,`updated_at`=? WHERE (`id`=?)"
        );
        assert_eq!(query.params[0], Value::from("Jon"));
        assert!(matches!(query.params[1], Value::DateTime(_)));
        assert_eq!(query.params[2], Value::Int(1));
    }

    #[test]
    fn set_row_writes_only_differences() {
        let mut orm = Orm::new(MockConnection::new());
        let mut row = john();
        row.extra.insert("shout".into(), Value::from("JOHN!"));
        assert!(row.extra.contains("shout"));

        let mut new = row.clone();
        new.tags.push("c".into());
        orm.update(&row).set_row(&new).execute().unwrap();

        let query = &orm.write_connection().log[0];
        assert_eq!(
            query.sql,
            "UPDATE `member` SET `tags`=?,`updated_at`=? WHERE (`id`=?)"
        );
        assert_eq!(query.params[0], Value::from("a,b,c"));
    }

    #[test]
    fn affected_count_other_than_one_is_an_error() {
        let mut connection = MockConnection::new();
        connection.affected.push_back(0);
        let mut orm = Orm::new(connection);
        let row = john();
        let err = orm
            .update(&row)
            .set("name", "Jon".to_string())
            .execute()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("UPDATE `member` SET"));
        assert!(message.contains("Int(1)"));
    }

    #[test]
    fn unknown_column_fails_before_any_sql() {
        let mut orm = Orm::new(MockConnection::new());
        let row = john();
        let err = orm
            .update(&row)
            .set("shout", "x".to_string())
            .execute()
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn { .. }));
        assert!(orm.write_connection().log.is_empty());
    }
}
