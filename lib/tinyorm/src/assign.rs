//! Pending column assignments of an insert or update.

use indexmap::IndexMap;
use tracing::trace;

use crate::{FieldValue, OrmError, TableMeta, Value};

/// The changes an insert or update will write, as seen by hooks.
///
/// Values are deflated as they are set. For an update, a value equal to the
/// row's current deflated value is not a change: setting it drops any pending
/// assignment for that column instead.
pub struct Assignments<'a, T> {
    meta: &'a TableMeta<T>,
    current: Option<&'a T>,
    values: &'a mut IndexMap<String, Value>,
}

impl<'a, T> Assignments<'a, T> {
    pub(crate) fn new(
        meta: &'a TableMeta<T>,
        current: Option<&'a T>,
        values: &'a mut IndexMap<String, Value>,
    ) -> Self {
        Self {
            meta,
            current,
            values,
        }
    }

    pub fn table(&self) -> &str {
        self.meta.name()
    }

    /// Whether these are the changes of an update rather than an insert.
    pub fn is_update(&self) -> bool {
        self.current.is_some()
    }

    /// The row being updated.
    pub fn current(&self) -> Option<&T> {
        self.current
    }

    pub fn set<F: FieldValue>(&mut self, column: &str, value: F) -> Result<(), OrmError> {
        let value = self.meta.field_value(column, &value)?;
        self.set_value(column, value)
    }

    pub fn set_value(&mut self, column: &str, value: Value) -> Result<(), OrmError> {
        assign(self.meta, self.current, self.values, column, value)
    }

    /// The pending deflated value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Deflate `value` into `values[column]`.
///
/// A column set again moves to the end, so the rendered column order follows
/// the most recent assignment.
pub(crate) fn assign<T>(
    meta: &TableMeta<T>,
    current: Option<&T>,
    values: &mut IndexMap<String, Value>,
    column: &str,
    value: Value,
) -> Result<(), OrmError> {
    let column = meta.require_column(column)?;
    let deflated = meta.deflate(column.name(), value)?;

    values.shift_remove(column.name());
    if let Some(row) = current {
        if meta.read_deflated(row, column)? == deflated {
            trace!(table = %meta.name(), column = %column.name(), "unchanged, skipping");
            return Ok(());
        }
    }
    values.insert(column.name().to_string(), deflated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, TableBuilder};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, Clone)]
    struct Member {
        id: i64,
        name: String,
        age: i64,
    }

    impl Entity for Member {
        fn describe(table: &mut TableBuilder<Self>) {
            table.name("member");
            table.column("id", |m: &Self| &m.id, |m| &mut m.id).primary_key();
            table.column("name", |m: &Self| &m.name, |m| &mut m.name);
            table.column("age", |m: &Self| &m.age, |m| &mut m.age);
            table.default_constructor();
        }
    }

    #[test]
    fn unchanged_values_are_not_changes() {
        let meta = TableMeta::<Member>::describe().unwrap();
        let row = Member {
            id: 1,
            name: "John".into(),
            age: 30,
        };
        let mut values = IndexMap::new();
        let mut changes = Assignments::new(&meta, Some(&row), &mut values);

        changes.set("name", "John".to_string()).unwrap();
        assert!(changes.is_empty());

        changes.set("name", "Jon".to_string()).unwrap();
        assert_eq!(changes.get("name"), Some(&Value::from("Jon")));

        // Setting it back to the current value cancels the change.
        changes.set("name", "John".to_string()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn order_follows_most_recent_set() {
        let meta = TableMeta::<Member>::describe().unwrap();
        let mut values = IndexMap::new();
        let mut changes = Assignments::new(&meta, None, &mut values);
        changes.set("name", "a".to_string()).unwrap();
        changes.set("age", 3i64).unwrap();
        changes.set("name", "b".to_string()).unwrap();
        assert!(!changes.is_update());
        assert_eq!(changes.columns().collect::<Vec<_>>(), vec!["age", "name"]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let meta = TableMeta::<Member>::describe().unwrap();
        let mut values = IndexMap::new();
        let mut changes = Assignments::new(&meta, None, &mut values);
        let err = changes.set("nickname", "x".to_string()).unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn { ref column, .. } if column == "nickname"));
    }
}
