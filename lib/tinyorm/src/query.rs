//! SQL fragments and statement rendering.
//!
//! Every statement ends up as a [`Query`]: SQL text with `?` placeholders and
//! the positional parameters that go with them. Rendering is pure; the
//! identifier quoting function comes from the connection.

use crate::Value;

/// An immutable (SQL text, parameters) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A fragment from SQL text and anything convertible to values.
    pub fn with<I>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(sql, params.into_iter().map(Into::into).collect())
    }
}

/// Accumulates SQL text and parameters for one statement.
#[derive(Debug, Default)]
pub(crate) struct QueryBuilder {
    sql: String,
    params: Vec<Value>,
}

impl QueryBuilder {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn push_fragment(&mut self, fragment: &Query) -> &mut Self {
        self.sql.push_str(&fragment.sql);
        self.params.extend(fragment.params.iter().cloned());
        self
    }

    /// ` WHERE (a) AND (b)`, nothing when there are no conditions.
    pub(crate) fn push_where(&mut self, conditions: &[Query]) -> &mut Self {
        for (i, condition) in conditions.iter().enumerate() {
            self.push_sql(if i == 0 { " WHERE (" } else { " AND (" });
            self.push_fragment(condition);
            self.push_sql(")");
        }
        self
    }

    pub(crate) fn build(self) -> Query {
        Query {
            sql: self.sql,
            params: self.params,
        }
    }
}

pub(crate) type Quote<'a> = &'a dyn Fn(&str) -> String;

/// The parts of a SELECT, in the order they render.
#[derive(Debug, Default, Clone)]
pub(crate) struct SelectParts {
    pub columns: Option<String>,
    pub conditions: Vec<Query>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub for_update: bool,
}

pub(crate) fn render_select(quote: Quote<'_>, table: &str, parts: &SelectParts) -> Query {
    let columns = parts.columns.as_deref().unwrap_or("*");
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM {}", columns, quote(table)));
    builder.push_where(&parts.conditions);
    if !parts.order_by.is_empty() {
        builder.push_sql(&format!(" ORDER BY {}", parts.order_by.join(",")));
    }
    if let Some(limit) = parts.limit {
        builder.push_sql(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = parts.offset {
        builder.push_sql(&format!(" OFFSET {}", offset));
    }
    if parts.for_update {
        builder.push_sql(" FOR UPDATE");
    }
    builder.build()
}

pub(crate) fn render_count(quote: Quote<'_>, table: &str, conditions: &[Query]) -> Query {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", quote(table)));
    builder.push_where(conditions);
    builder.build()
}

pub(crate) fn render_insert(
    quote: Quote<'_>,
    table: &str,
    values: &[(String, Value)],
    on_duplicate: &[Query],
) -> Query {
    let columns: Vec<String> = values.iter().map(|(column, _)| quote(column)).collect();
    let placeholders = vec!["?"; values.len()].join(",");
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(","),
        placeholders
    ));
    builder
        .params
        .extend(values.iter().map(|(_, value)| value.clone()));

    for (i, clause) in on_duplicate.iter().enumerate() {
        builder.push_sql(if i == 0 { " ON DUPLICATE KEY UPDATE " } else { "," });
        builder.push_fragment(clause);
    }
    builder.build()
}

pub(crate) fn render_update(
    quote: Quote<'_>,
    table: &str,
    values: &[(String, Value)],
    key: &[Query],
) -> Query {
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, _)| format!("{}=?", quote(column)))
        .collect();
    let mut builder = QueryBuilder::new(format!(
        "UPDATE {} SET {}",
        quote(table),
        assignments.join(",")
    ));
    builder
        .params
        .extend(values.iter().map(|(_, value)| value.clone()));
    builder.push_where(key);
    builder.build()
}

pub(crate) fn render_delete(quote: Quote<'_>, table: &str, key: &[Query]) -> Query {
    let mut builder = QueryBuilder::new(format!("DELETE FROM {}", quote(table)));
    builder.push_where(key);
    builder.build()
}

/// `<column>=?` conditions for a primary key.
pub(crate) fn key_conditions(quote: Quote<'_>, key: Vec<(String, Value)>) -> Vec<Query> {
    key.into_iter()
        .map(|(column, value)| Query::new(format!("{}=?", quote(&column)), vec![value]))
        .collect()
}
