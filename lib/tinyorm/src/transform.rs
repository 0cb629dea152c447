//! Inflate/deflate pipelines.
//!
//! Inflate turns a raw database value into the in-memory form a field type
//! accepts; deflate turns a field's in-memory form into something a
//! connection can bind. Each column owns one pipeline per direction, built
//! once when its table metadata is built.

use std::fmt;

use crate::time::{parse_date, parse_datetime, parse_time};
use crate::{Element, Kind, OrmError, Value, ValueError};

/// Signature of every transform step. Plain function pointers: a step has no
/// receiver and no captured state.
pub type TransformFn = fn(Value) -> Result<Value, ValueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inflate,
    Deflate,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inflate => "inflate",
            Direction::Deflate => "deflate",
        }
    }
}

/// Column encodings that can be requested explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Csv,
    Set,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Csv => "csv",
            Encoding::Set => "set",
        }
    }

    pub(crate) fn accepts(self, kind: Kind) -> bool {
        matches!(
            (self, kind),
            (Encoding::Json, Kind::Json | Kind::Any)
                | (Encoding::Csv, Kind::List(_))
                | (Encoding::Set, Kind::Set)
        )
    }
}

/// A named pure conversion step.
#[derive(Clone, Copy)]
pub struct Transform {
    name: &'static str,
    apply: TransformFn,
}

impl Transform {
    pub const fn new(name: &'static str, apply: TransformFn) -> Self {
        Self { name, apply }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, value: Value) -> Result<Value, ValueError> {
        (self.apply)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const OPTIONAL: &str = "optional";

/// An ordered chain of transforms for one column and direction.
///
/// When `optional` is set, a null input is returned untouched without running
/// the inner steps; that step is reported last for inflate and first for
/// deflate.
#[derive(Debug, Clone)]
pub struct Pipeline {
    direction: Direction,
    steps: Vec<Transform>,
    optional: bool,
}

impl Pipeline {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            steps: Vec::new(),
            optional: false,
        }
    }

    /// The standard chain for a field kind, with or without an explicit
    /// encoding.
    pub fn standard(
        direction: Direction,
        kind: Kind,
        encoding: Option<Encoding>,
        nullable: bool,
    ) -> Self {
        let step = match (direction, encoding, kind) {
            (Direction::Inflate, Some(Encoding::Json), _) => Some(JSON_INFLATE),
            (Direction::Deflate, Some(Encoding::Json), _) => Some(JSON_DEFLATE),
            (Direction::Inflate, Some(Encoding::Csv), Kind::List(Element::Int)) => {
                Some(CSV_INT_INFLATE)
            }
            (Direction::Inflate, Some(Encoding::Csv), _) => Some(CSV_TEXT_INFLATE),
            (Direction::Deflate, Some(Encoding::Csv), _) => Some(CSV_DEFLATE),
            (Direction::Inflate, Some(Encoding::Set), _) => Some(SET_INFLATE),
            (Direction::Deflate, Some(Encoding::Set), _) => Some(SET_DEFLATE),
            (Direction::Inflate, None, Kind::Bool) => Some(BOOL_INFLATE),
            (Direction::Inflate, None, Kind::Float) => Some(FLOAT_INFLATE),
            (Direction::Inflate, None, Kind::Date) => Some(DATE_INFLATE),
            (Direction::Deflate, None, Kind::Date) => Some(DATE_DEFLATE),
            (Direction::Inflate, None, Kind::Time) => Some(TIME_INFLATE),
            (Direction::Deflate, None, Kind::Time) => Some(TIME_DEFLATE),
            (Direction::Inflate, None, Kind::DateTime) => Some(DATETIME_INFLATE),
            (Direction::Deflate, None, Kind::DateTime) => Some(DATETIME_DEFLATE),
            _ => None,
        };
        Self {
            direction,
            steps: step.into_iter().collect(),
            optional: nullable,
        }
    }

    /// A chain made of a single user-supplied function. Replaces the standard
    /// chain entirely, optional handling included.
    pub fn explicit(direction: Direction, apply: TransformFn) -> Self {
        Self {
            direction,
            steps: vec![Transform::new("explicit", apply)],
            optional: false,
        }
    }

    pub fn push(&mut self, transform: Transform) {
        self.steps.push(transform);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in the order they apply.
    pub fn step_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.steps.iter().map(Transform::name).collect();
        if self.optional {
            match self.direction {
                Direction::Inflate => names.push(OPTIONAL),
                Direction::Deflate => names.insert(0, OPTIONAL),
            }
        }
        names
    }

    pub fn apply(&self, table: &str, column: &str, value: Value) -> Result<Value, OrmError> {
        if self.optional && value.is_null() {
            return Ok(Value::Null);
        }
        self.steps.iter().try_fold(value, |value, step| {
            step.apply(value).map_err(|source| OrmError::Transform {
                table: table.to_string(),
                column: column.to_string(),
                step: format!("{} {}", self.direction.as_str(), step.name()),
                source,
            })
        })
    }
}

pub const BOOL_INFLATE: Transform = Transform::new("bool", |value| match value {
    Value::Bool(b) => Ok(Value::Bool(b)),
    Value::Int(0) => Ok(Value::Bool(false)),
    Value::Int(1) => Ok(Value::Bool(true)),
    Value::Int(n) => Err(ValueError::Invalid(format!("{n} is not a boolean"))),
    other => Err(ValueError::mismatch("bool", &other)),
});

pub const FLOAT_INFLATE: Transform = Transform::new("float", |value| match value {
    Value::Float(n) => Ok(Value::Float(n)),
    Value::Int(n) => Ok(Value::Float(n as f64)),
    other => Err(ValueError::mismatch("float", &other)),
});

pub const DATE_INFLATE: Transform = Transform::new("date", |value| match value {
    Value::Date(d) => Ok(Value::Date(d)),
    Value::Text(s) => parse_date(&s)
        .map(Value::Date)
        .ok_or_else(|| ValueError::Invalid(format!("invalid date {s:?}"))),
    other => Err(ValueError::mismatch("date", &other)),
});

pub const DATE_DEFLATE: Transform = Transform::new("date", |value| match value {
    Value::Date(d) => Ok(Value::Date(d)),
    other => Err(ValueError::mismatch("date", &other)),
});

pub const TIME_INFLATE: Transform = Transform::new("time", |value| match value {
    Value::Time(t) => Ok(Value::Time(t)),
    Value::Text(s) => parse_time(&s)
        .map(Value::Time)
        .ok_or_else(|| ValueError::Invalid(format!("invalid time {s:?}"))),
    other => Err(ValueError::mismatch("time", &other)),
});

pub const TIME_DEFLATE: Transform = Transform::new("time", |value| match value {
    Value::Time(t) => Ok(Value::Time(t)),
    other => Err(ValueError::mismatch("time", &other)),
});

pub const DATETIME_INFLATE: Transform = Transform::new("datetime", |value| match value {
    Value::DateTime(dt) => Ok(Value::DateTime(dt)),
    Value::Text(s) => parse_datetime(&s)
        .map(Value::DateTime)
        .ok_or_else(|| ValueError::Invalid(format!("invalid datetime {s:?}"))),
    other => Err(ValueError::mismatch("datetime", &other)),
});

pub const DATETIME_DEFLATE: Transform = Transform::new("datetime", |value| match value {
    Value::DateTime(dt) => Ok(Value::DateTime(dt)),
    other => Err(ValueError::mismatch("datetime", &other)),
});

// Only byte sequences are accepted: anything else reaching a JSON column is a
// mapping mistake.
pub const JSON_INFLATE: Transform = Transform::new("json", |value| match value {
    Value::Bytes(bytes) => serde_json::from_slice(&bytes)
        .map(Value::Json)
        .map_err(|e| ValueError::Invalid(e.to_string())),
    other => Err(ValueError::mismatch("bytes", &other)),
});

pub const JSON_DEFLATE: Transform = Transform::new("json", |value| match value {
    Value::Json(json) => serde_json::to_vec(&json)
        .map(Value::Bytes)
        .map_err(|e| ValueError::Invalid(e.to_string())),
    other => Err(ValueError::mismatch("json", &other)),
});

pub const CSV_TEXT_INFLATE: Transform = Transform::new("csv", |value| match value {
    Value::Text(s) => Ok(Value::List(
        csv::decode(&s)?.into_iter().map(Value::Text).collect(),
    )),
    other => Err(ValueError::mismatch("text", &other)),
});

pub const CSV_INT_INFLATE: Transform = Transform::new("csv", |value| match value {
    Value::Text(s) => csv::decode(&s)?
        .into_iter()
        .map(|field| {
            field
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ValueError::Invalid(format!("{field:?} is not an integer")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List),
    other => Err(ValueError::mismatch("text", &other)),
});

pub const CSV_DEFLATE: Transform = Transform::new("csv", |value| match value {
    Value::List(items) => {
        let fields = items
            .into_iter()
            .map(|item| match item {
                Value::Text(s) => Ok(s),
                Value::Int(n) => Ok(n.to_string()),
                other => Err(ValueError::mismatch("text or int", &other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Text(csv::encode(&fields)))
    }
    other => Err(ValueError::mismatch("list", &other)),
});

pub const SET_INFLATE: Transform = Transform::new("set", |value| match value {
    Value::Text(s) => Ok(Value::List(
        s.split(',')
            .filter(|member| !member.is_empty())
            .map(|member| Value::Text(member.to_string()))
            .collect(),
    )),
    other => Err(ValueError::mismatch("text", &other)),
});

pub const SET_DEFLATE: Transform = Transform::new("set", |value| match value {
    Value::List(items) => {
        let members = items
            .into_iter()
            .map(|item| match item {
                Value::Text(s) if s.contains(',') => Err(ValueError::Invalid(format!(
                    "set member {s:?} contains a comma"
                ))),
                Value::Text(s) if s.is_empty() => {
                    Err(ValueError::Invalid("empty set member".to_string()))
                }
                Value::Text(s) => Ok(s),
                other => Err(ValueError::mismatch("text", &other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Text(members.join(",")))
    }
    other => Err(ValueError::mismatch("list", &other)),
});

/// RFC-4180 style delimited text, one record per value.
pub mod csv {
    use crate::ValueError;

    fn needs_quotes(field: &str) -> bool {
        field.contains([',', '"', '\n', '\r'])
    }

    pub fn encode(fields: &[String]) -> String {
        // A lone empty field is quoted so it does not read back as an empty list.
        if fields.len() == 1 && fields[0].is_empty() {
            return "\"\"".to_string();
        }

        let mut out = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            if needs_quotes(field) {
                out.push('"');
                out.push_str(&field.replace('"', "\"\""));
                out.push('"');
            } else {
                out.push_str(field);
            }
        }
        out
    }

    pub fn decode(input: &str) -> Result<Vec<String>, ValueError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut after_quote = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                        after_quote = true;
                    }
                } else {
                    current.push(c);
                }
                continue;
            }

            match c {
                ',' => {
                    fields.push(std::mem::take(&mut current));
                    after_quote = false;
                }
                _ if after_quote => {
                    return Err(ValueError::Invalid(format!(
                        "unexpected {c:?} after quoted field in {input:?}"
                    )));
                }
                '"' if current.is_empty() => in_quotes = true,
                '"' => {
                    return Err(ValueError::Invalid(format!(
                        "stray quote in unquoted field in {input:?}"
                    )));
                }
                _ => current.push(c),
            }
        }

        if in_quotes {
            return Err(ValueError::Invalid(format!(
                "unterminated quoted field in {input:?}"
            )));
        }
        fields.push(current);
        Ok(fields)
    }
}
