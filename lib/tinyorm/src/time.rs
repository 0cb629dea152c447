use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{Kind, Value};

/// Current UTC time truncated to microsecond precision (6 decimal places),
/// the finest precision common datetime columns keep.
pub fn now_micros() -> NaiveDateTime {
    let now = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(time) => time,
        Err(_) => std::time::Duration::from_secs(0),
    };

    let timestamp_micros = (now.as_secs() as i64 * 1_000_000) + (now.subsec_micros() as i64);
    let time = if let Some(time) = DateTime::from_timestamp_micros(timestamp_micros) {
        time
    } else {
        DateTime::<Utc>::from_timestamp_nanos(0)
    };
    time.naive_utc()
}

/// The value a timestamp column is stamped with, in the column's in-memory form.
pub(crate) fn stamp(kind: Kind) -> Value {
    let now = now_micros();
    match kind {
        Kind::Date => Value::Date(now.date()),
        Kind::Int => Value::Int(now.and_utc().timestamp()),
        _ => Value::DateTime(now),
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub(crate) fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).naive_utc())
        })
}
