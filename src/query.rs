//! Typed queries
//!
//! A `Query<E>` is a list of `column = value` filters over one entity's
//! table. Column names come from the entity's column enum, values are always
//! bound as parameters.

use crate::model::{Column, Entity};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;
use std::fmt;
use std::marker::PhantomData;

/// A value compared against a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Integer(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Text(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Text(v)
    }
}

impl From<Option<i64>> for Literal {
    fn from(v: Option<i64>) -> Self {
        v.map(Literal::Integer).unwrap_or(Literal::Null)
    }
}

impl ToSql for Literal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Literal::Null => ToSqlOutput::Owned(Value::Null),
            Literal::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Literal::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

pub struct Query<E: Entity> {
    filters: Vec<(E::Column, Literal)>,
    limit: Option<usize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            limit: None,
            _entity: PhantomData,
        }
    }

    /// Keep rows where `column` equals `value`. Filters are ANDed.
    pub fn filter(mut self, column: E::Column, value: impl Into<Literal>) -> Self {
        self.filters.push((column, value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// WHERE clause and the parameters it binds, in `?N` order
    fn where_clause(&self) -> (String, Vec<&Literal>) {
        if self.filters.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Vec::new();
        let conditions: Vec<String> = self
            .filters
            .iter()
            .map(|(column, value)| match value {
                Literal::Null => format!("{} IS NULL", column.name()),
                _ => {
                    params.push(value);
                    format!("{} = ?{}", column.name(), params.len())
                }
            })
            .collect();

        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }

    /// SELECT statement for this query, ordered by primary key
    pub fn to_sql(&self) -> (String, Vec<&Literal>) {
        let columns: Vec<&str> = E::columns().iter().map(|c| c.name()).collect();
        let (where_clause, params) = self.where_clause();
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            columns.join(", "),
            E::TABLE,
            where_clause,
            E::ID.name()
        );
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        (sql, params)
    }

    pub fn to_count_sql(&self) -> (String, Vec<&Literal>) {
        let (where_clause, params) = self.where_clause();
        (format!("SELECT COUNT(*) FROM {}{}", E::TABLE, where_clause), params)
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            limit: self.limit,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &E::TABLE)
            .field("filters", &self.filters)
            .field("limit", &self.limit)
            .finish()
    }
}
