#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tinyorm::{Assignments, Entity, ExtraColumns, Json, Orm, OrmError};
use tinyorm_sqlite::{ConnectionConfig, SqliteConnection};

pub const SCHEMA: &str = "
    CREATE TABLE member (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );
    CREATE TABLE event (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        on_time INTEGER NOT NULL DEFAULT 0,
        day TEXT,
        created_at TEXT,
        updated_at TEXT
    );
    CREATE TABLE profile (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        settings BLOB NOT NULL,
        note BLOB,
        tags TEXT NOT NULL,
        roles TEXT NOT NULL
    );
";

#[derive(Debug, Clone, PartialEq, Entity)]
#[table(name = "member")]
pub struct Member {
    #[pk]
    pub id: i64,
    pub name: String,
    #[extra]
    pub extra: ExtraColumns,
}

pub fn backdate(changes: &mut Assignments<'_, Event>) -> Result<(), OrmError> {
    changes.set("created_at", Some(epoch()))
}

pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[derive(Debug, Clone, PartialEq, Entity)]
#[table(name = "event", before_insert = "backdate")]
pub struct Event {
    #[pk]
    pub id: i64,
    pub title: String,
    pub on_time: bool,
    pub day: Option<NaiveDate>,
    #[created_at]
    pub created_at: Option<NaiveDateTime>,
    #[updated_at]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub font_size: u32,
}

#[derive(Debug, Clone, PartialEq, Entity)]
#[table(name = "profile")]
pub struct Profile {
    #[pk]
    pub id: i64,
    pub settings: Json<Settings>,
    #[column(json)]
    pub note: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub roles: BTreeSet<String>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn connection() -> SqliteConnection {
    let connection = SqliteConnection::open(ConnectionConfig::Memory).unwrap();
    connection.execute_batch(SCHEMA).unwrap();
    connection
}

pub fn orm() -> Orm<SqliteConnection> {
    init_tracing();
    Orm::new(connection())
}

pub fn insert_member(orm: &mut Orm<SqliteConnection>, name: &str) -> Member {
    orm.insert::<Member>()
        .value("name", name.to_string())
        .execute_select()
        .unwrap()
}
