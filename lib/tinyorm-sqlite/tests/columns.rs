#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use tinyorm::{Json, Value};

use common::{Event, Profile, Settings, epoch, orm};

#[test]
fn user_hook_overrides_created_timestamp() {
    let mut orm = orm();
    let event = orm
        .insert::<Event>()
        .value("title", "launch".to_string())
        .execute_select()
        .unwrap();

    assert_eq!(event.created_at, Some(epoch()));
    assert!(event.updated_at.is_some());
    assert!(!event.on_time);
}

#[test]
fn updated_timestamp_moves_on_update() {
    let mut orm = orm();
    let event = orm
        .insert::<Event>()
        .value("title", "launch".to_string())
        .execute_select()
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    orm.update(&event)
        .set("on_time", true)
        .set("day", Some(day))
        .execute()
        .unwrap();

    let updated = orm.refetch(&event).unwrap().unwrap();
    assert!(updated.on_time);
    assert_eq!(updated.day, Some(day));
    assert_eq!(updated.created_at, Some(epoch()));
    assert!(updated.updated_at >= event.updated_at);
}

#[test]
fn temporal_columns_are_stored_as_sortable_text() {
    let mut orm = orm();
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    orm.insert::<Event>()
        .value("title", "leap".to_string())
        .value("day", Some(day))
        .execute()
        .unwrap();

    let stored = orm
        .write_connection()
        .query_row("SELECT day, created_at FROM event", [], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .unwrap();
    assert_eq!(stored, ("2024-02-29".to_string(), "2001-01-01 00:00:00".to_string()));
}

#[test]
fn json_csv_and_set_columns_round_trip() {
    let mut orm = orm();
    let settings = Settings {
        theme: "dark".into(),
        font_size: 14,
    };
    let roles: BTreeSet<String> = ["admin", "editor"].into_iter().map(String::from).collect();

    let profile = orm
        .insert::<Profile>()
        .value("settings", Json(settings.clone()))
        .value("note", Some(json!({"pinned": true})))
        .value("tags", vec!["a,b".to_string(), "c".to_string()])
        .value("roles", roles.clone())
        .execute_select()
        .unwrap();

    assert_eq!(profile.settings, Json(settings));
    assert_eq!(profile.note, Some(json!({"pinned": true})));
    assert_eq!(profile.tags, vec!["a,b", "c"]);
    assert_eq!(profile.roles, roles);

    let raw = orm
        .query_rows::<Profile, _>("SELECT * FROM profile", Vec::<Value>::new())
        .unwrap();
    assert_eq!(raw, vec![profile]);
}

#[test]
fn null_json_column_stays_null() {
    let mut orm = orm();
    let profile = orm
        .insert::<Profile>()
        .value("settings", Json(Settings::default()))
        .value("tags", Vec::<String>::new())
        .value("roles", BTreeSet::<String>::new())
        .execute_select()
        .unwrap();
    assert_eq!(profile.note, None);
    assert!(profile.tags.is_empty());
    assert!(profile.roles.is_empty());
}

#[test]
fn unsupported_member_is_a_transform_error() {
    let mut orm = orm();
    let roles: BTreeSet<String> = ["a,b".to_string()].into_iter().collect();
    let err = orm
        .insert::<Profile>()
        .value("settings", Json(Settings::default()))
        .value("tags", Vec::<String>::new())
        .value("roles", roles)
        .execute()
        .unwrap_err();
    assert!(err.to_string().starts_with("profile.roles"), "{err}");
}
