//! The execution adapter interface.
//!
//! A [`Statement`] is SQL in logical form: `?` placeholders and a
//! parallel vector of bound [`Value`]s. Backends translate it to their
//! dialect at execution time and map driver errors into the shared
//! taxonomy.

use async_trait::async_trait;
use chatarral_core::Result;

use crate::dialect::Dialect;
use crate::row::Row;
use crate::value::Value;

/// A logical SQL statement plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Bound values, one per placeholder, in order.
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rowid of the last insert, where the backend reports one.
    pub last_insert_id: Option<i64>,
    /// Number of rows the statement touched.
    pub rows_affected: u64,
}

/// The storage abstraction every route goes through.
///
/// Implementations re-tag driver errors at this boundary:
/// pool-acquire timeouts become `ResourceExhausted`, unique-constraint
/// violations become `Conflict` with the constraint name, everything
/// else becomes `Storage`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The dialect this backend speaks. Used by callers that assemble
    /// dialect-specific expressions (date grouping, DDL).
    fn dialect(&self) -> Dialect;

    /// Runs a query and returns all rows, canonicalized.
    async fn fetch_all(&self, stmt: Statement) -> Result<Vec<Row>>;

    /// Runs a query and returns the first row if any. An empty result
    /// is `Ok(None)`, never an error; extra rows are ignored.
    async fn fetch_one(&self, stmt: Statement) -> Result<Option<Row>>;

    /// Runs a write statement.
    async fn execute(&self, stmt: Statement) -> Result<ExecResult>;

    /// Runs an INSERT and returns the new row's id atomically:
    /// `last_insert_rowid()` on SQLite, `RETURNING id` on PostgreSQL.
    async fn insert_returning_id(&self, stmt: Statement) -> Result<i64>;
}
