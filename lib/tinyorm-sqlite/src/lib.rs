//! SQLite implementation for tinyorm.
//!
//! This crate provides a [`tinyorm::Connection`] over rusqlite. Identifiers
//! are quoted with double quotes, booleans bind as 0/1 and dates and times as
//! ISO-8601 text. A statement timeout interrupts the statement through a
//! progress handler and surfaces as a timeout error.
//!
//! # Usage
//!
//! ```text
//! use tinyorm::{Entity, Orm, OrmConfig};
//! use tinyorm_sqlite::SqliteConnection;
//!
//! #[derive(Entity)]
//! #[table(name = "member")]
//! pub struct Member {
//!     #[pk]
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! let connection = SqliteConnection::open("app.db")?;
//! let mut orm = Orm::new(connection).with_config(OrmConfig::new().query_timeout(timeout));
//! let john = orm.insert::<Member>().value("name", "John".to_string()).execute_select()?;
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

mod config;
mod executor;
mod value;

pub use config::ConnectionConfig;
pub use executor::SqliteConnection;

// Re-export core types for convenience
pub use tinyorm::{
    Connection, DbError, Entity, Orm, OrmConfig, OrmError, Query, Registry, StatementOptions,
    Value,
};
