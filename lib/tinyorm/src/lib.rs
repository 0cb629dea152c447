//! tinyorm - A small synchronous ORM over parameterized SQL.
//!
//! This crate maps Rust types to database tables and builds the SQL to read
//! and write them. Statement execution is delegated to a backend through the
//! [`Connection`] trait.
//!
//! # Core Concepts
//!
//! - **Table metadata**: each mapped type describes its table once (columns,
//!   primary keys, value transforms, hooks, row construction). The result is
//!   cached per type in a [`Registry`].
//! - **Inflate / deflate**: the transform chains that turn raw database values
//!   into field values and back.
//! - **Extra columns**: result columns the type does not declare, kept in an
//!   [`ExtraColumns`] store instead of failing the read.
//!
//! # Traits
//!
//! - [`Entity`]: Types mapped to a table
//! - [`FieldValue`]: Field types that can live in a column
//! - [`Connection`]: Backends that execute statements
//!
//! # Example
//!
//! ```text
//! let mut orm = Orm::new(SqliteConnection::open(":memory:")?);
//! let john: Member = orm.insert::<Member>().value("name", "John".to_string()).execute_select()?;
//! orm.update(&john).set("name", "Jon".to_string()).execute()?;
//! let members = orm.select::<Member>().r#where("name LIKE ?", ["J%"]).order_by("id DESC").list()?;
//! ```

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unwrap_in_result
    )
)]

// Lets the derive's `::tinyorm::` paths resolve inside this crate too.
extern crate self as tinyorm;

mod assign;
mod config;
mod count;
mod delete;
mod entity;
mod error;
mod executor;
mod insert;
mod orm;
mod query;
mod registry;
mod select;
mod stream;
mod table;
mod time;
pub mod transform;
mod update;
mod value;

#[cfg(test)]
mod testing;

pub use assign::Assignments;
pub use config::OrmConfig;
pub use count::Count;
pub use delete::Delete;
pub use entity::Entity;
pub use error::{ConfigError, DbError, OrmError, Result, ValueError};
pub use executor::{Connection, Cursor, StatementOptions};
pub use insert::Insert;
pub use orm::Orm;
pub use query::Query;
pub use registry::Registry;
pub use select::{Paginated, Select};
pub use stream::Rows;
pub use table::{Column, ColumnBuilder, Hook, RowArgs, TableBuilder, TableMeta};
pub use time::now_micros;
pub use transform::{Direction, Encoding, Pipeline, TransformFn};
pub use update::Update;
pub use value::{Element, ExtraColumns, FieldValue, Json, Kind, Value};

// Re-export derive macro
pub use tinyorm_derive::Entity;
