//! Statement builders.
//!
//! Every builder compiles into a [`StatementSeed`]: the SQL text together
//! with the persistent types of its `?` placeholders in textual order.
//! Arguments are supplied per execution through [`ArgBindings`], which
//! validates and encodes them before anything reaches the executor.

mod bindings;
mod column_values;
mod delete;
mod insert;
mod join;
pub(crate) mod select;
mod update;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{BindingError, Error, Result};
use crate::executor::SqlExecutor;
use crate::expr::Node;
use crate::identity::Identity;
use crate::schema::Table;
use crate::types::{AnyType, BindArg};

pub use bindings::ArgBindings;
pub use column_values::ColumnValues;
pub use delete::Delete;
pub use insert::Insert;
pub use join::{Join, JoinType};
pub use select::{Select, SelectItem, Selectable, SortOrder};
pub use update::{HasAssignments, NoAssignments, Update};

// ============================================================================
// SQL builder
// ============================================================================

/// Accumulates SQL text and the types of the placeholders written into it.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    types: Vec<Arc<dyn AnyType>>,
}

impl SqlBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw SQL.
    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Appends a quoted identifier.
    pub fn push_identity(&mut self, identity: &Identity) -> &mut Self {
        self.sql.push_str(identity.quoted());
        self
    }

    /// Appends a `?` placeholder whose argument is encoded by `ty`.
    pub fn push_bind(&mut self, ty: &Arc<dyn AnyType>) -> &mut Self {
        self.sql.push('?');
        self.types.push(Arc::clone(ty));
        self
    }

    pub(crate) fn push_node(&mut self, node: &Node) -> &mut Self {
        node.append_to(self);
        self
    }

    /// The SQL written so far.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of placeholders written so far.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.types.len()
    }

    /// Finishes the statement.
    #[must_use]
    pub fn into_seed(self) -> StatementSeed {
        StatementSeed {
            sql: self.sql,
            types: self.types,
        }
    }
}

// ============================================================================
// Statement seed
// ============================================================================

/// Compiled SQL plus the ordered types of its bind placeholders.
#[derive(Debug, Clone)]
pub struct StatementSeed {
    sql: String,
    types: Vec<Arc<dyn AnyType>>,
}

impl StatementSeed {
    /// A seed without placeholders.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            types: Vec::new(),
        }
    }

    pub(crate) fn from_parts(sql: String, types: Vec<Arc<dyn AnyType>>) -> Self {
        Self { sql, types }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder types in textual order.
    #[must_use]
    pub fn types(&self) -> &[Arc<dyn AnyType>] {
        &self.types
    }

    /// Number of placeholders.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.types.len()
    }

    /// Whether the statement has placeholders.
    #[must_use]
    pub fn has_bind_args(&self) -> bool {
        !self.types.is_empty()
    }

    /// A fresh binder with one unbound slot per placeholder.
    #[must_use]
    pub fn bindings(&self) -> ArgBindings {
        ArgBindings::new(self.types.clone())
    }

    /// Runs `bind` against a fresh binder and returns the encoded arguments.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindingError`] raised by `bind`, or
    /// [`BindingError::UnboundArgument`] if a slot was left unset.
    pub fn bind_args<F>(&self, bind: F) -> std::result::Result<Vec<BindArg>, BindingError>
    where
        F: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
    {
        let mut bindings = self.bindings();
        bind(&mut bindings)?;
        bindings.arguments()
    }

    /// Binds the arguments and executes the statement.
    ///
    /// Returns the number of affected rows reported by the executor.
    ///
    /// # Errors
    ///
    /// Binding errors are returned before any SQL reaches the executor.
    /// Executor failures are returned as [`Error::Executor`].
    pub fn execute<F>(&self, executor: &mut dyn SqlExecutor, bind: F) -> Result<u64>
    where
        F: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
    {
        let args = self.bind_args(bind)?;
        debug!(sql = %self.sql, args = args.len(), "Executing statement");
        executor.exec(&self.sql, &args).map_err(Error::Executor)
    }

    /// Executes a statement that has no placeholders.
    ///
    /// # Errors
    ///
    /// Fails with [`BindingError::UnboundArgument`] if the statement does
    /// have placeholders, or with [`Error::Executor`].
    pub fn run(&self, executor: &mut dyn SqlExecutor) -> Result<u64> {
        self.execute(executor, |_| Ok(()))
    }
}

impl fmt::Display for StatementSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

// ============================================================================
// Column sets
// ============================================================================

/// Something rows can be selected from: a table, an aliased table, a view,
/// a join or an aliased subquery.
pub trait ColumnSet: fmt::Debug + Send + Sync {
    /// Writes the FROM-clause form.
    fn append_from(&self, b: &mut SqlBuilder);

    /// The items selected when no explicit list is given.
    fn select_items(&self) -> Vec<SelectItem>;

    /// The underlying table, when this set is a plain table.
    fn as_table(&self) -> Option<&Table> {
        None
    }
}

/// Conversion into a shared [`ColumnSet`].
pub trait IntoColumnSet {
    /// Converts into a shared column set.
    fn into_column_set(self) -> Arc<dyn ColumnSet>;
}

impl<S: ColumnSet + Clone + 'static> IntoColumnSet for &S {
    fn into_column_set(self) -> Arc<dyn ColumnSet> {
        Arc::new(self.clone())
    }
}

impl IntoColumnSet for Join {
    fn into_column_set(self) -> Arc<dyn ColumnSet> {
        Arc::new(self)
    }
}

impl IntoColumnSet for Arc<dyn ColumnSet> {
    fn into_column_set(self) -> Arc<dyn ColumnSet> {
        self
    }
}
