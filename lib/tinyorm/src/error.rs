use thiserror::Error;

use crate::Value;

/// Descriptor build failures. Cloneable so the registry can hand the same
/// failure back on every later use of the type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{type_name}: missing table name")]
    MissingTableName { type_name: &'static str },

    #[error("{table}: no row construction strategy registered")]
    MissingConstructor { table: String },

    #[error("{table}: both constructor and setter strategies registered")]
    AmbiguousConstructor { table: String },

    #[error("{table}: column {column} declared twice")]
    DuplicateColumn { table: String, column: String },

    #[error("{table}: more than one explicit {direction} transform for column {column}")]
    DuplicateTransform {
        table: String,
        column: String,
        direction: &'static str,
    },

    #[error("{table}: {direction} transform registered for unknown column {column}")]
    TransformForUnknownColumn {
        table: String,
        column: String,
        direction: &'static str,
    },

    #[error("{table}: column {column} is not a valid timestamp column (kind {kind})")]
    InvalidTimestampColumn {
        table: String,
        column: String,
        kind: String,
    },

    #[error("{table}: {encoding} encoding does not apply to column {column} (kind {kind})")]
    IncompatibleEncoding {
        table: String,
        column: String,
        encoding: &'static str,
        kind: String,
    },
}

/// A value outside the domain of a field type or transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("expected {expected}, got {actual}")]
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ValueError {
    pub fn mismatch(expected: &'static str, actual: &Value) -> Self {
        ValueError::Mismatch {
            expected,
            actual: actual.type_name(),
        }
    }
}

/// Failures reported by a database backend.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("statement timed out")]
    Timeout,

    #[error("unsupported parameter: {0}")]
    UnsupportedValue(&'static str),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl DbError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        DbError::Backend(Box::new(e))
    }

    /// Attach the statement that failed.
    pub fn at(self, query: &crate::Query) -> OrmError {
        OrmError::Execution {
            sql: query.sql.clone(),
            params: format!("{:?}", query.params),
            source: self,
        }
    }
}

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{table}.{column}: {step} failed: {source}")]
    Transform {
        table: String,
        column: String,
        step: String,
        source: ValueError,
    },

    #[error("cannot build {type_name}: parameter {parameter}: {source}")]
    Construct {
        type_name: &'static str,
        parameter: String,
        source: ValueError,
    },

    #[error("{table}: unknown column {column}")]
    UnknownColumn { table: String, column: String },

    #[error("{table}: no primary key declared")]
    MissingPrimaryKey { table: String },

    #[error("{table}: invalid primary key {column}={value:?}")]
    InvalidPrimaryKey {
        table: String,
        column: String,
        value: Value,
    },

    #[error("{source} (sql: {sql}, params: {params})")]
    Execution {
        sql: String,
        params: String,
        source: DbError,
    },

    #[error("expected {expected} affected row(s), got {actual} (sql: {sql}, params: {params})")]
    RowCount {
        sql: String,
        params: String,
        expected: u64,
        actual: u64,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl OrmError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            OrmError::Execution {
                source: DbError::Timeout,
                ..
            }
        )
    }

    pub(crate) fn row_count(query: &crate::Query, expected: u64, actual: u64) -> Self {
        OrmError::RowCount {
            sql: query.sql.clone(),
            params: format!("{:?}", query.params),
            expected,
            actual,
        }
    }
}

pub type Result<T, E = OrmError> = std::result::Result<T, E>;
