//! Executor abstraction for running built statements.
//!
//! Provides the `Executor` trait that the relation resolver hands its rendered
//! SQL and bound values to. The resolver never talks to a database driver
//! directly: each model type exposes the executor (connection) it lives on, and
//! every statement built for that model goes through it.
//!
//! Execution is blocking. A call returns once the statement has run; timeouts,
//! retries and cancellation belong to the implementation behind the trait.

use sea_query::{Value, Values};
use std::fmt;

/// Executor error type
#[derive(Debug)]
pub enum ExecutorError {
    /// Query execution error
    Query(String),
    /// Row parsing/conversion error
    Parse(String),
    /// Error raised by the underlying driver, kept intact
    Backend(Box<dyn std::error::Error + Send + Sync>),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Query(s) => {
                write!(f, "Query error: {s}")
            }
            ExecutorError::Parse(s) => {
                write!(f, "Parse error: {s}")
            }
            ExecutorError::Backend(e) => {
                write!(f, "Backend error: {e}")
            }
            ExecutorError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// A materialized result row.
///
/// Columns keep the order the database returned them in. Lookup by name
/// returns the first column with that name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Append a column
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Get a column value by position
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different implementations
/// (direct client, pooled connection, transaction, etc.) to be used interchangeably.
/// Statements arrive already rendered by `sea-query` with their parameters
/// collected in `Values`, in placeholder order.
///
/// # Examples
///
/// ```no_run
/// use throughway::executor::{Executor, ExecutorError};
/// use sea_query::Values;
///
/// # fn example(executor: &dyn Executor) -> Result<(), ExecutorError> {
/// let affected = executor.execute(
///     r#"DELETE FROM "post_tag" WHERE "post_id" = $1"#,
///     &Values(vec![42i64.into()]),
/// )?;
/// # Ok(())
/// # }
/// ```
pub trait Executor: Send + Sync {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL statement with `$n` placeholders
    /// * `values` - Parameters to bind, in placeholder order
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the statement fails. The resolver propagates it unchanged.
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecutorError>;

    /// Execute a query and return all rows
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL query with `$n` placeholders
    /// * `values` - Parameters to bind, in placeholder order
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the query fails.
    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Row>, ExecutorError>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecutorError> {
        (**self).execute(sql, values)
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Row>, ExecutorError> {
        (**self).query_all(sql, values)
    }
}
