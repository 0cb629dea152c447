//! Entity trait for types mapped to a table.
//!
//! Add `#[derive(Entity)]` with `#[table(name = "...")]` to a struct to
//! generate the implementation, or implement [`Entity::describe`] by hand.

use crate::TableBuilder;

/// Trait for types that map to a database table.
///
/// `describe` declares the table name, the columns and their field
/// accessors, transforms, hooks and how rows are constructed. It runs once
/// per type per [`crate::Registry`]; the result is cached.
///
/// # Example
///
/// ```text
/// #[derive(Entity, Default)]
/// #[table(name = "member", default)]
/// pub struct Member {
///     #[pk]
///     pub id: i64,
///     #[column(name = "full_name")]
///     pub name: String,
///     #[column(csv)]
///     pub tags: Vec<String>,
///     #[created_at]
///     pub created_at: Option<NaiveDateTime>,
///     #[extra]
///     pub extra: ExtraColumns,
/// }
/// ```
///
/// # Column Naming
///
/// Columns are named after their fields unless renamed with
/// `#[column(name = "...")]`. Use `#[column(skip)]` to leave a field unmapped.
pub trait Entity: Sized + 'static {
    fn describe(table: &mut TableBuilder<Self>);
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    use crate::{
        Assignments, ConfigError, Entity, ExtraColumns, OrmError, TableMeta, Value, ValueError,
    };

    fn shout(value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
            other => Err(ValueError::mismatch("text", &other)),
        }
    }

    fn touch(changes: &mut Assignments<'_, Article>) -> Result<(), OrmError> {
        changes.set("revision", 1i64)
    }

    #[derive(Debug, Entity)]
    #[table(name = "article", before_insert = "touch")]
    struct Article {
        #[pk]
        id: i64,
        #[column(name = "headline", inflate = "shout")]
        title: String,
        #[column(csv)]
        tags: Vec<String>,
        revision: i64,
        #[created_at]
        created_at: Option<NaiveDateTime>,
        #[column(skip)]
        cached: Option<String>,
        #[extra]
        extra: ExtraColumns,
    }

    #[derive(Debug, Default, Entity)]
    #[table(name = "flag", default)]
    struct Flag {
        #[pk]
        name: String,
        on: bool,
    }

    #[derive(Entity)]
    #[table(name = "twice")]
    struct Twice {
        #[pk]
        id: i64,
        #[column(inflate = "shout")]
        #[column(inflate = "shout")]
        name: String,
    }

    #[derive(Entity)]
    struct Untitled {
        #[pk]
        id: i64,
    }

    #[test]
    fn derived_columns_follow_attributes() {
        let meta = TableMeta::<Article>::describe().unwrap();
        assert_eq!(meta.name(), "article");
        assert_eq!(
            meta.column_names(),
            vec!["id", "headline", "tags", "revision", "created_at"]
        );
        assert_eq!(meta.primary_key_names(), vec!["id"]);
        assert_eq!(meta.row_strategy(), "constructor");
        assert_eq!(meta.column("headline").unwrap().inflaters(), vec!["explicit"]);
        assert_eq!(meta.column("headline").unwrap().field(), "title");
    }

    #[test]
    fn derived_constructor_builds_rows() {
        let meta = TableMeta::<Article>::describe().unwrap();
        let labels: Vec<String> = ["id", "headline", "tags", "revision", "created_at", "score"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = meta
            .materialize(
                &labels,
                vec![
                    Value::Int(1),
                    Value::from("hello"),
                    Value::from("x,y"),
                    Value::Int(3),
                    Value::Null,
                    Value::Float(0.5),
                ],
            )
            .unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.title, "HELLO");
        assert_eq!(row.tags, vec!["x", "y"]);
        assert_eq!(row.revision, 3);
        assert_eq!(row.created_at, None);
        assert_eq!(row.cached, None);
        assert_eq!(row.extra.get("score"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn derived_default_strategy_and_missing_name() {
        let meta = TableMeta::<Flag>::describe().unwrap();
        assert_eq!(meta.row_strategy(), "setter");
        let row = meta
            .materialize(&["name".to_string(), "on".to_string()], vec![
                Value::from("beta"),
                Value::Int(1),
            ])
            .unwrap();
        assert_eq!(row.name, "beta");
        assert!(row.on);

        assert!(matches!(
            TableMeta::<Untitled>::describe(),
            Err(ConfigError::MissingTableName { .. })
        ));
    }

    #[test]
    fn derived_repeated_inflate_fails_the_build() {
        assert_eq!(
            TableMeta::<Twice>::describe().unwrap_err(),
            ConfigError::DuplicateTransform {
                table: "twice".into(),
                column: "name".into(),
                direction: "inflate",
            }
        );
    }
}
