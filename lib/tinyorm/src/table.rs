//! Table metadata: what a mapped type's columns are, how their values are
//! transformed, which hooks run before writes, and how rows are materialized.
//!
//! A [`TableMeta`] is built once per type from the declarations its
//! [`Entity::describe`] makes on a [`TableBuilder`], then shared read-only.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

use crate::assign::Assignments;
use crate::time;
use crate::transform::{Direction, Encoding, Pipeline, TransformFn};
use crate::{
    ConfigError, Entity, ExtraColumns, FieldValue, Kind, OrmError, Value, ValueError,
};

type Getter<T> = Box<dyn Fn(&T) -> Result<Value, ValueError> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<(), ValueError> + Send + Sync>;
type ExtrasAccess<T> = Box<dyn Fn(&mut T) -> &mut ExtraColumns + Send + Sync>;

/// A callback run against an in-flight insert or update before it renders.
pub type Hook<T> = Box<dyn Fn(&mut Assignments<'_, T>) -> Result<(), OrmError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timestamp {
    Created,
    Updated,
}

enum RowStrategy<T> {
    /// All declared columns are handed to a constructor at once.
    Constructor(Box<dyn Fn(&mut RowArgs) -> Result<T, OrmError> + Send + Sync>),
    /// A default instance is populated column by column.
    Setter(Box<dyn Fn() -> T + Send + Sync>),
}

impl<T> RowStrategy<T> {
    fn as_str(&self) -> &'static str {
        match self {
            RowStrategy::Constructor(_) => "constructor",
            RowStrategy::Setter(_) => "setter",
        }
    }
}

struct ColumnDecl<T> {
    field: String,
    name: String,
    kind: Kind,
    nullable: bool,
    get: Getter<T>,
    set: Setter<T>,
    primary_key: bool,
    timestamp: Option<Timestamp>,
    encoding: Option<Encoding>,
    inflate: Vec<TransformFn>,
    deflate: Vec<TransformFn>,
}

/// Collects the declarations of one mapped type.
///
/// Declarations are only validated by [`TableBuilder::build`], so a
/// misconfigured type fails as a whole the first time it is used.
pub struct TableBuilder<T> {
    type_name: &'static str,
    name: Option<String>,
    columns: Vec<ColumnDecl<T>>,
    overrides: Vec<(Direction, String, TransformFn)>,
    before_insert: Vec<Hook<T>>,
    before_update: Vec<Hook<T>>,
    strategies: Vec<RowStrategy<T>>,
    extras: Option<ExtrasAccess<T>>,
}

impl<T: 'static> TableBuilder<T> {
    pub fn new() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            name: None,
            columns: Vec::new(),
            overrides: Vec::new(),
            before_insert: Vec::new(),
            before_update: Vec::new(),
            strategies: Vec::new(),
            extras: None,
        }
    }

    /// Set the table name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Declare a column backed by a field. The column is named after the
    /// field unless renamed.
    pub fn column<F, G, M>(&mut self, field: &str, get: G, get_mut: M) -> ColumnBuilder<'_, T>
    where
        F: FieldValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.columns.push(ColumnDecl {
            field: field.to_string(),
            name: field.to_string(),
            kind: F::kind(),
            nullable: F::nullable(),
            get: Box::new(move |row: &T| get(row).to_value()),
            set: Box::new(move |row: &mut T, value: Value| {
                *get_mut(row) = F::from_value(value)?;
                Ok(())
            }),
            primary_key: false,
            timestamp: None,
            encoding: None,
            inflate: Vec::new(),
            deflate: Vec::new(),
        });
        let index = self.columns.len() - 1;
        ColumnBuilder {
            decl: &mut self.columns[index],
        }
    }

    /// Register an explicit inflater for a column by its effective name.
    pub fn inflate(&mut self, column: impl Into<String>, f: TransformFn) -> &mut Self {
        self.overrides.push((Direction::Inflate, column.into(), f));
        self
    }

    /// Register an explicit deflater for a column by its effective name.
    pub fn deflate(&mut self, column: impl Into<String>, f: TransformFn) -> &mut Self {
        self.overrides.push((Direction::Deflate, column.into(), f));
        self
    }

    pub fn before_insert<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn(&mut Assignments<'_, T>) -> Result<(), OrmError> + Send + Sync + 'static,
    {
        self.before_insert.push(Box::new(hook));
        self
    }

    pub fn before_update<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn(&mut Assignments<'_, T>) -> Result<(), OrmError> + Send + Sync + 'static,
    {
        self.before_update.push(Box::new(hook));
        self
    }

    /// Where result columns that are not declared end up.
    pub fn extra_columns<A>(&mut self, access: A) -> &mut Self
    where
        A: Fn(&mut T) -> &mut ExtraColumns + Send + Sync + 'static,
    {
        self.extras = Some(Box::new(access));
        self
    }

    /// Build rows by handing every declared column to `construct` at once.
    pub fn constructor<F>(&mut self, construct: F) -> &mut Self
    where
        F: Fn(&mut RowArgs) -> Result<T, OrmError> + Send + Sync + 'static,
    {
        self.strategies
            .push(RowStrategy::Constructor(Box::new(construct)));
        self
    }

    /// Build rows from `T::default()` and assign each column through its field.
    pub fn default_constructor(&mut self) -> &mut Self
    where
        T: Default,
    {
        self.strategies
            .push(RowStrategy::Setter(Box::new(T::default)));
        self
    }

    pub fn build(mut self) -> Result<TableMeta<T>, ConfigError> {
        let name = self.name.take().ok_or(ConfigError::MissingTableName {
            type_name: self.type_name,
        })?;

        let strategy = match self.strategies.len() {
            0 => return Err(ConfigError::MissingConstructor { table: name }),
            1 => self.strategies.remove(0),
            _ => return Err(ConfigError::AmbiguousConstructor { table: name }),
        };

        let mut by_name = HashMap::new();
        for (index, decl) in self.columns.iter().enumerate() {
            if by_name.insert(decl.name.clone(), index).is_some() {
                return Err(ConfigError::DuplicateColumn {
                    table: name,
                    column: decl.name.clone(),
                });
            }
        }

        for (direction, column, f) in self.overrides.drain(..) {
            let Some(&index) = by_name.get(&column) else {
                return Err(ConfigError::TransformForUnknownColumn {
                    table: name,
                    column,
                    direction: direction.as_str(),
                });
            };
            let decl = &mut self.columns[index];
            match direction {
                Direction::Inflate => decl.inflate.push(f),
                Direction::Deflate => decl.deflate.push(f),
            }
        }

        let mut timestamp_inserts: Vec<Hook<T>> = Vec::new();
        let mut timestamp_updates: Vec<Hook<T>> = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut primary_keys = Vec::new();

        for (index, decl) in self.columns.into_iter().enumerate() {
            if let Some(timestamp) = decl.timestamp {
                if !matches!(decl.kind, Kind::DateTime | Kind::Date | Kind::Int) {
                    return Err(ConfigError::InvalidTimestampColumn {
                        table: name,
                        column: decl.name,
                        kind: decl.kind.to_string(),
                    });
                }
                timestamp_inserts.push(stamp_hook(&decl.name, decl.kind));
                if timestamp == Timestamp::Updated {
                    timestamp_updates.push(stamp_hook(&decl.name, decl.kind));
                }
            }

            let encoding = match decl.encoding {
                Some(encoding) if !encoding.accepts(decl.kind) => {
                    return Err(ConfigError::IncompatibleEncoding {
                        table: name,
                        column: decl.name,
                        encoding: encoding.as_str(),
                        kind: decl.kind.to_string(),
                    });
                }
                Some(encoding) => Some(encoding),
                None => default_encoding(decl.kind),
            };

            let inflate = pipeline(&name, &decl, Direction::Inflate, &decl.inflate, encoding)?;
            let deflate = pipeline(&name, &decl, Direction::Deflate, &decl.deflate, encoding)?;

            if decl.primary_key {
                primary_keys.push(index);
            }
            columns.push(Column {
                field: decl.field,
                name: decl.name,
                kind: decl.kind,
                nullable: decl.nullable,
                primary_key: decl.primary_key,
                get: decl.get,
                set: decl.set,
                inflate,
                deflate,
            });
        }

        // Timestamps are stamped first so user hooks can still override them.
        timestamp_inserts.append(&mut self.before_insert);
        timestamp_updates.append(&mut self.before_update);

        Ok(TableMeta {
            type_name: self.type_name,
            name,
            columns,
            by_name,
            primary_keys,
            before_insert: timestamp_inserts,
            before_update: timestamp_updates,
            strategy,
            extras: self.extras,
        })
    }
}

impl<T: 'static> Default for TableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn default_encoding(kind: Kind) -> Option<Encoding> {
    match kind {
        Kind::Json => Some(Encoding::Json),
        Kind::List(_) => Some(Encoding::Csv),
        Kind::Set => Some(Encoding::Set),
        _ => None,
    }
}

fn pipeline<T>(
    table: &str,
    decl: &ColumnDecl<T>,
    direction: Direction,
    explicit: &[TransformFn],
    encoding: Option<Encoding>,
) -> Result<Pipeline, ConfigError> {
    match explicit {
        [] => Ok(Pipeline::standard(
            direction,
            decl.kind,
            encoding,
            decl.nullable,
        )),
        [f] => Ok(Pipeline::explicit(direction, *f)),
        _ => Err(ConfigError::DuplicateTransform {
            table: table.to_string(),
            column: decl.name.clone(),
            direction: direction.as_str(),
        }),
    }
}

fn stamp_hook<T: 'static>(column: &str, kind: Kind) -> Hook<T> {
    let column = column.to_string();
    Box::new(move |assignments: &mut Assignments<'_, T>| {
        assignments.set_value(&column, time::stamp(kind))
    })
}

/// Refines the column most recently declared on a [`TableBuilder`].
pub struct ColumnBuilder<'b, T> {
    decl: &'b mut ColumnDecl<T>,
}

impl<T> ColumnBuilder<'_, T> {
    pub fn primary_key(self) -> Self {
        self.decl.primary_key = true;
        self
    }

    pub fn rename(self, name: impl Into<String>) -> Self {
        self.decl.name = name.into();
        self
    }

    /// Stamp the current time on insert.
    pub fn created_at(self) -> Self {
        self.decl.timestamp = Some(Timestamp::Created);
        self
    }

    /// Stamp the current time on insert and on every update.
    pub fn updated_at(self) -> Self {
        self.decl.timestamp = Some(Timestamp::Updated);
        self
    }

    pub fn json(self) -> Self {
        self.decl.encoding = Some(Encoding::Json);
        self
    }

    pub fn csv(self) -> Self {
        self.decl.encoding = Some(Encoding::Csv);
        self
    }

    pub fn string_set(self) -> Self {
        self.decl.encoding = Some(Encoding::Set);
        self
    }

    /// Replace the column's whole inflate chain with `f`.
    pub fn inflate(self, f: TransformFn) -> Self {
        self.decl.inflate.push(f);
        self
    }

    /// Replace the column's whole deflate chain with `f`.
    pub fn deflate(self, f: TransformFn) -> Self {
        self.decl.deflate.push(f);
        self
    }
}

/// A built column.
pub struct Column<T> {
    field: String,
    name: String,
    kind: Kind,
    nullable: bool,
    primary_key: bool,
    get: Getter<T>,
    set: Setter<T>,
    inflate: Pipeline,
    deflate: Pipeline,
}

impl<T> Column<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn inflaters(&self) -> Vec<&'static str> {
        self.inflate.step_names()
    }

    pub fn deflaters(&self) -> Vec<&'static str> {
        self.deflate.step_names()
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("primary_key", &self.primary_key)
            .field("inflate", &self.inflate)
            .field("deflate", &self.deflate)
            .finish()
    }
}

/// The inflated values of one result row, keyed by column name, handed to a
/// constructor.
#[derive(Debug)]
pub struct RowArgs {
    type_name: &'static str,
    values: IndexMap<String, Value>,
}

impl RowArgs {
    /// Take a column's value as the constructor parameter type. A column
    /// missing from the result reads as null.
    pub fn take<F: FieldValue>(&mut self, column: &str) -> Result<F, OrmError> {
        let value = self.values.shift_remove(column).unwrap_or(Value::Null);
        F::from_value(value).map_err(|source| OrmError::Construct {
            type_name: self.type_name,
            parameter: column.to_string(),
            source,
        })
    }
}

/// Descriptor of one mapped type.
pub struct TableMeta<T> {
    type_name: &'static str,
    name: String,
    columns: Vec<Column<T>>,
    by_name: HashMap<String, usize>,
    primary_keys: Vec<usize>,
    before_insert: Vec<Hook<T>>,
    before_update: Vec<Hook<T>>,
    strategy: RowStrategy<T>,
    extras: Option<ExtrasAccess<T>>,
}

impl<T: Entity> TableMeta<T> {
    /// Build the descriptor from the type's declarations.
    pub fn describe() -> Result<Self, ConfigError> {
        let mut builder = TableBuilder::new();
        T::describe(&mut builder);
        builder.build()
    }
}

impl<T> TableMeta<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column<T>> {
        self.columns.iter()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column<T>> {
        self.by_name.get(name).map(|&index| &self.columns[index])
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Column<T>> {
        self.primary_keys.iter().map(|&index| &self.columns[index])
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_keys().map(Column::name).collect()
    }

    /// `"constructor"` or `"setter"`.
    pub fn row_strategy(&self) -> &'static str {
        self.strategy.as_str()
    }

    pub(crate) fn require_column(&self, name: &str) -> Result<&Column<T>, OrmError> {
        self.column(name).ok_or_else(|| OrmError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn inflate(&self, column: &str, raw: Value) -> Result<Value, OrmError> {
        let column = self.require_column(column)?;
        column.inflate.apply(&self.name, &column.name, raw)
    }

    pub fn deflate(&self, column: &str, value: Value) -> Result<Value, OrmError> {
        let column = self.require_column(column)?;
        column.deflate.apply(&self.name, &column.name, value)
    }

    /// A field type converted to its in-memory value, for `column`.
    pub(crate) fn field_value<F: FieldValue>(
        &self,
        column: &str,
        value: &F,
    ) -> Result<Value, OrmError> {
        value.to_value().map_err(|source| OrmError::Transform {
            table: self.name.clone(),
            column: column.to_string(),
            step: "to_value".to_string(),
            source,
        })
    }

    /// The in-memory value of `column` on `row`.
    pub(crate) fn read(&self, row: &T, column: &Column<T>) -> Result<Value, OrmError> {
        (column.get)(row).map_err(|source| OrmError::Transform {
            table: self.name.clone(),
            column: column.name.clone(),
            step: "to_value".to_string(),
            source,
        })
    }

    /// The bindable value of `column` on `row`.
    pub(crate) fn read_deflated(&self, row: &T, column: &Column<T>) -> Result<Value, OrmError> {
        let value = self.read(row, column)?;
        column.deflate.apply(&self.name, &column.name, value)
    }

    /// Primary key columns with their current bindable values.
    ///
    /// Fails when the type has no primary key, when a key is null, or when a
    /// single integer key is zero and `allow_zero` is not set: such a key
    /// would not identify the row.
    pub(crate) fn primary_key(
        &self,
        row: &T,
        allow_zero: bool,
    ) -> Result<Vec<(String, Value)>, OrmError> {
        if self.primary_keys.is_empty() {
            return Err(OrmError::MissingPrimaryKey {
                table: self.name.clone(),
            });
        }

        let single = self.primary_keys.len() == 1;
        self.primary_keys()
            .map(|column| {
                let value = self.read_deflated(row, column)?;
                let invalid = value.is_null() || (single && !allow_zero && value == Value::Int(0));
                if invalid {
                    return Err(OrmError::InvalidPrimaryKey {
                        table: self.name.clone(),
                        column: column.name.clone(),
                        value,
                    });
                }
                Ok((column.name.clone(), value))
            })
            .collect()
    }

    pub(crate) fn run_before_insert(
        &self,
        assignments: &mut Assignments<'_, T>,
    ) -> Result<(), OrmError> {
        self.before_insert
            .iter()
            .try_for_each(|hook| hook(assignments))
    }

    pub(crate) fn run_before_update(
        &self,
        assignments: &mut Assignments<'_, T>,
    ) -> Result<(), OrmError> {
        self.before_update
            .iter()
            .try_for_each(|hook| hook(assignments))
    }

    /// Turn one result row into a `T`.
    ///
    /// Declared columns are inflated and routed to the row strategy; any other
    /// column goes to the extra-column store.
    pub fn materialize(&self, labels: &[String], values: Vec<Value>) -> Result<T, OrmError> {
        let mut declared = IndexMap::new();
        let mut extras = ExtraColumns::default();

        for (label, raw) in labels.iter().zip(values) {
            match self.column(label) {
                Some(column) => {
                    let value = column.inflate.apply(&self.name, &column.name, raw)?;
                    declared.insert(column.name.clone(), value);
                }
                None => extras.insert(label.clone(), raw),
            }
        }

        let mut row = match &self.strategy {
            RowStrategy::Constructor(construct) => {
                let mut args = RowArgs {
                    type_name: self.type_name,
                    values: declared,
                };
                construct(&mut args)?
            }
            RowStrategy::Setter(new) => {
                let mut row = new();
                for (name, value) in declared {
                    if let Some(column) = self.column(&name) {
                        (column.set)(&mut row, value).map_err(|source| OrmError::Construct {
                            type_name: self.type_name,
                            parameter: name.clone(),
                            source,
                        })?;
                    }
                }
                row
            }
        };

        match &self.extras {
            Some(access) => *access(&mut row) = extras,
            None if !extras.is_empty() => {
                trace!(
                    table = %self.name,
                    columns = ?extras.iter().map(|(k, _)| k).collect::<Vec<_>>(),
                    "no extra column store, dropping"
                );
            }
            None => {}
        }

        Ok(row)
    }
}

impl<T> fmt::Debug for TableMeta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMeta")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("columns", &self.columns)
            .field("primary_keys", &self.primary_key_names())
            .field("strategy", &self.strategy.as_str())
            .finish()
    }
}
