//! Conversions between tinyorm values and SQLite storage classes.

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use tinyorm::{DbError, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A statement parameter.
///
/// SQLite has no boolean or temporal storage class: booleans bind as 0/1 and
/// dates and times as ISO-8601 text, which sorts chronologically.
#[derive(Debug)]
pub(crate) struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self.0 {
            Value::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            Value::Bool(true) => Ok(ToSqlOutput::Owned(SqlValue::Integer(1))),
            Value::Bool(false) => Ok(ToSqlOutput::Owned(SqlValue::Integer(0))),
            Value::Int(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*v))),
            Value::Float(v) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v))),
            Value::Text(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Value::Bytes(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(&v[..]))),
            Value::Date(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(
                v.format(DATE_FORMAT).to_string(),
            ))),
            Value::Time(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(
                v.format(TIME_FORMAT).to_string(),
            ))),
            Value::DateTime(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(
                v.format(DATETIME_FORMAT).to_string(),
            ))),
            other => Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
                DbError::UnsupportedValue(other.type_name()),
            ))),
        }
    }
}

/// Wrap statement parameters for binding, rejecting values that only exist
/// in memory.
pub(crate) fn bind(params: &[Value]) -> Result<Vec<Param<'_>>, DbError> {
    params
        .iter()
        .map(|value| match value {
            Value::Json(_) | Value::List(_) => Err(DbError::UnsupportedValue(value.type_name())),
            value => Ok(Param(value)),
        })
        .collect()
}

/// Read a result column. TEXT that is not valid UTF-8 is an error.
pub(crate) fn load(value: ValueRef<'_>) -> Result<Value, DbError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => {
            Value::Text(std::str::from_utf8(v).map_err(DbError::backend)?.to_string())
        }
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    })
}
