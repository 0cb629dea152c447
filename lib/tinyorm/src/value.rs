//! Dynamic values exchanged with the database, and the field types that map
//! onto them.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ValueError;

/// A value that can be bound to a statement parameter or read from a result
/// column.
///
/// `Json` and `List` only exist in memory: they are what JSON, CSV and set
/// columns inflate to, and their deflaters turn them back into `Bytes` or
/// `Text` before anything reaches a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Json(_) => "json",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The declared shape of a mapped field. Drives which standard transforms a
/// column gets when nothing explicit is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    Json,
    /// Ordered list stored as delimited text.
    List(Element),
    /// Set of strings stored as a comma-joined string.
    Set,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Text,
    Int,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::List(Element::Text) => write!(f, "list<text>"),
            Kind::List(Element::Int) => write!(f, "list<int>"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// A Rust type that can live in a mapped column.
///
/// `to_value` produces the in-memory form that deflaters start from, and
/// `from_value` accepts the in-memory form inflaters end with.
pub trait FieldValue: Sized {
    fn kind() -> Kind;

    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Result<Value, ValueError>;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! int_field {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn kind() -> Kind {
                    Kind::Int
                }

                fn to_value(&self) -> Result<Value, ValueError> {
                    i64::try_from(*self)
                        .map(Value::Int)
                        .map_err(|e| ValueError::Invalid(e.to_string()))
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Int(n) => <$ty>::try_from(n).map_err(|_| {
                            ValueError::Invalid(format!(
                                "{} out of range for {}",
                                n,
                                stringify!($ty)
                            ))
                        }),
                        other => Err(ValueError::mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

int_field!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FieldValue for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl FieldValue for f64 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(n) => Ok(n),
            other => Err(ValueError::mismatch("f64", &other)),
        }
    }
}

impl FieldValue for f32 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Float(f64::from(*self)))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(n) => Ok(n as f32),
            other => Err(ValueError::mismatch("f32", &other)),
        }
    }
}

impl FieldValue for String {
    fn kind() -> Kind {
        Kind::Text
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::mismatch("String", &other)),
        }
    }
}

impl FieldValue for Vec<u8> {
    fn kind() -> Kind {
        Kind::Bytes
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Bytes(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(ValueError::mismatch("Vec<u8>", &other)),
        }
    }
}

impl FieldValue for NaiveDate {
    fn kind() -> Kind {
        Kind::Date
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Date(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(d) => Ok(d),
            other => Err(ValueError::mismatch("NaiveDate", &other)),
        }
    }
}

impl FieldValue for NaiveTime {
    fn kind() -> Kind {
        Kind::Time
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Time(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Time(t) => Ok(t),
            other => Err(ValueError::mismatch("NaiveTime", &other)),
        }
    }
}

impl FieldValue for NaiveDateTime {
    fn kind() -> Kind {
        Kind::DateTime
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::DateTime(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(ValueError::mismatch("NaiveDateTime", &other)),
        }
    }
}

// Stored as naive UTC.
impl FieldValue for DateTime<Utc> {
    fn kind() -> Kind {
        Kind::DateTime
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::DateTime(self.naive_utc()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(dt.and_utc()),
            other => Err(ValueError::mismatch("DateTime<Utc>", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn kind() -> Kind {
        T::kind()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FieldValue for Vec<String> {
    fn kind() -> Kind {
        Kind::List(Element::Text)
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::List(self.iter().cloned().map(Value::Text).collect()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(String::from_value).collect(),
            other => Err(ValueError::mismatch("Vec<String>", &other)),
        }
    }
}

impl FieldValue for Vec<i64> {
    fn kind() -> Kind {
        Kind::List(Element::Int)
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::List(self.iter().copied().map(Value::Int).collect()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(i64::from_value).collect(),
            other => Err(ValueError::mismatch("Vec<i64>", &other)),
        }
    }
}

impl FieldValue for BTreeSet<String> {
    fn kind() -> Kind {
        Kind::Set
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::List(self.iter().cloned().map(Value::Text).collect()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(String::from_value).collect(),
            other => Err(ValueError::mismatch("BTreeSet<String>", &other)),
        }
    }
}

impl FieldValue for serde_json::Value {
    fn kind() -> Kind {
        Kind::Json
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Json(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Json(j) => Ok(j),
            other => Err(ValueError::mismatch("serde_json::Value", &other)),
        }
    }
}

/// Any serde type stored in a JSON column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> FieldValue for Json<T> {
    fn kind() -> Kind {
        Kind::Json
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        serde_json::to_value(&self.0)
            .map(Value::Json)
            .map_err(|e| ValueError::Invalid(e.to_string()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Json(j) => serde_json::from_value(j)
                .map(Json)
                .map_err(|e| ValueError::Invalid(e.to_string())),
            other => Err(ValueError::mismatch("json", &other)),
        }
    }
}

impl FieldValue for Value {
    fn kind() -> Kind {
        Kind::Any
    }

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

/// Result columns that are not declared on the mapped type, such as computed
/// aliases or joined columns. Read-only from the ORM's point of view: they are
/// never written back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraColumns(IndexMap<String, Value>);

impl ExtraColumns {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.0.insert(name, value);
    }
}
