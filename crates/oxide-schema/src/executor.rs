//! The executor contract.
//!
//! The crate never talks to a database directly. Hosts implement
//! [`SqlExecutor`] over their driver; statements and queries hand it SQL
//! text plus already-encoded [`BindArg`]s, and read results back through
//! [`RowCursor`] and [`Row`].

use serde::{Deserialize, Serialize};

use crate::types::{BindArg, Value, ValueRef};

/// Error raised by an executor implementation.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Options an executor exposes to the statements it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Run `EXPLAIN QUERY PLAN` before each query and log the plan.
    pub log_query_plans: bool,
}

impl ExecutorConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            log_query_plans: false,
        }
    }

    /// Enables or disables query-plan logging.
    #[must_use]
    pub const fn with_query_plans(mut self, enabled: bool) -> Self {
        self.log_query_plans = enabled;
        self
    }
}

/// One result row.
pub trait Row {
    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Name of the column at `index`.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Value at `index`, `None` when out of range.
    fn value(&self, index: usize) -> Option<ValueRef<'_>>;
}

/// Forward-only iteration over result rows.
pub trait RowCursor {
    /// Advances to the next row. The returned row is valid until the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn next_row(&mut self) -> Result<Option<&dyn Row>, ExecutorError>;
}

/// Runs SQL on behalf of the crate.
pub trait SqlExecutor {
    /// Executes a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn exec(&mut self, sql: &str, args: &[BindArg]) -> Result<u64, ExecutorError>;

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn query(&mut self, sql: &str, args: &[BindArg]) -> Result<Box<dyn RowCursor + '_>, ExecutorError>;

    /// The executor's configuration.
    fn config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
    }
}

/// An owned row.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl MemoryRow {
    /// A row with the given column names and values.
    #[must_use]
    pub const fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// The row's values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Row for MemoryRow {
    fn column_count(&self) -> usize {
        self.values.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn value(&self, index: usize) -> Option<ValueRef<'_>> {
        self.values.get(index).map(Value::as_value_ref)
    }
}

/// A cursor over rows held in memory, for executors that materialize
/// results and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    rows: Vec<MemoryRow>,
    position: usize,
}

impl MemoryCursor {
    /// A cursor over `rows`, all sharing the column names `columns`.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| MemoryRow::new(columns.clone(), values))
            .collect();
        Self { rows, position: 0 }
    }

    /// A cursor over prepared rows.
    #[must_use]
    pub const fn from_rows(rows: Vec<MemoryRow>) -> Self {
        Self { rows, position: 0 }
    }

    /// Number of rows not yet returned.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.position)
    }
}

impl RowCursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<&dyn Row>, ExecutorError> {
        let row = self.rows.get(self.position);
        if row.is_some() {
            self.position += 1;
        }
        Ok(row.map(|row| row as &dyn Row))
    }
}
