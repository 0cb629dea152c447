#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tinyorm::{Orm, OrmConfig, OrmError, Value};
use tinyorm_sqlite::{ConnectionConfig, SqliteConnection};

use common::{Member, SCHEMA, connection, init_tracing, insert_member, orm};

fn names(orm: &mut Orm<SqliteConnection>) -> Vec<String> {
    orm.select::<Member>()
        .order_by("id")
        .list()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect()
}

#[test]
fn reads_go_to_the_read_connection() {
    init_tracing();
    let replica = connection();
    replica
        .inner()
        .execute("INSERT INTO member (name) VALUES ('replica')", [])
        .unwrap();
    let mut orm = Orm::new(connection()).with_read_connection(replica);
    insert_member(&mut orm, "primary");

    assert_eq!(names(&mut orm), vec!["replica"]);

    let forced: Vec<String> = orm
        .select::<Member>()
        .force_write()
        .list()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(forced, vec!["primary"]);
    assert_eq!(orm.count::<Member>().force_write().execute().unwrap(), 1);
}

#[test]
fn reads_inside_a_transaction_use_the_write_connection() {
    init_tracing();
    let mut orm = Orm::new(connection()).with_read_connection(connection());

    orm.begin().unwrap();
    assert!(orm.in_transaction());
    insert_member(&mut orm, "pending");
    assert_eq!(names(&mut orm), vec!["pending"]);
    orm.rollback().unwrap();

    assert!(!orm.in_transaction());
    assert!(names(&mut orm).is_empty());
}

#[test]
fn shared_memory_replica_sees_committed_writes() {
    init_tracing();
    let name = "tinyorm_shared_replica".to_string();
    let primary = SqliteConnection::open(ConnectionConfig::SharedMemory(name.clone())).unwrap();
    primary.execute_batch(SCHEMA).unwrap();
    let replica = SqliteConnection::open(ConnectionConfig::SharedMemory(name)).unwrap();
    let mut orm = Orm::new(primary).with_read_connection(replica);

    insert_member(&mut orm, "John");
    assert_eq!(names(&mut orm), vec!["John"]);
}

#[test]
fn transaction_commits_or_rolls_back() {
    let mut orm = orm();

    let id = orm
        .transaction(|orm| Ok(insert_member(orm, "kept").id))
        .unwrap();
    assert_eq!(id, 1);

    let result: Result<(), OrmError> = orm.transaction(|orm| {
        insert_member(orm, "dropped");
        Err(OrmError::NotFound("abort".into()))
    });
    assert!(matches!(result, Err(OrmError::NotFound(_))));
    assert!(!orm.in_transaction());
    assert_eq!(names(&mut orm), vec!["kept"]);
}

#[test]
fn stream_stops_early_and_releases_the_statement() {
    let mut orm = orm();
    for name in ["a", "b", "c", "d"] {
        insert_member(&mut orm, name);
    }

    let first_two = orm
        .select::<Member>()
        .order_by("id")
        .stream(|rows| rows.take(2).map(|row| row.map(|m| m.name)).collect::<Result<Vec<_>, _>>())
        .unwrap();
    assert_eq!(first_two, vec!["a", "b"]);

    // Fails with "table is locked" while a statement on it is still active.
    orm.execute_sql("DROP TABLE member", Vec::<Value>::new())
        .unwrap();
}

#[test]
fn stream_exposes_column_labels() {
    let mut orm = orm();
    insert_member(&mut orm, "a");
    let labels = orm
        .select::<Member>()
        .columns("id, name, 1 AS one")
        .stream(|rows| Ok(rows.columns().to_vec()))
        .unwrap();
    assert_eq!(labels, vec!["id", "name", "one"]);
}

#[test]
fn long_statement_times_out() {
    init_tracing();
    let mut orm = Orm::new(connection())
        .with_config(OrmConfig::new().query_timeout(Duration::from_millis(50)));

    let started = Instant::now();
    let err = orm
        .query_for_long(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
             SELECT count(*) FROM c",
            Vec::<Value>::new(),
        )
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));

    // The deadline does not outlive the statement.
    insert_member(&mut orm, "after");
    assert_eq!(orm.count::<Member>().execute().unwrap(), 1);
}
