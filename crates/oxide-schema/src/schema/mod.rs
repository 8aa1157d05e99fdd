//! Schema model: tables, columns, constraints, indices, views and triggers.
//!
//! Schema objects are built once through builders and are immutable
//! afterwards. Each object renders deterministic DDL and implements
//! [`Creatable`], which runs that DDL through a [`SqlExecutor`].

mod column;
mod constraint;
mod index;
pub mod introspect;
mod table;
mod trigger;
mod view;

use tracing::info;

use crate::builder::{SqlBuilder, StatementSeed};
use crate::error::Result;
use crate::executor::SqlExecutor;
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{TextType, TypeRef};

pub use column::{AnyColumn, Column, ColumnBuilder, ColumnDef};
pub use constraint::{CheckConstraint, Collate, ForeignKeyAction, ForeignKeyConstraint, OnConflict};
pub use index::Index;
pub use introspect::{describe_table, ColumnMetadata, FieldType, TableDescription};
pub use table::{Table, TableAlias, TableBuilder};
pub use trigger::{
    Trigger, TriggerBody, TriggerBuilder, TriggerEvent, TriggerScope, TriggerTiming,
};
pub use view::{View, ViewBuilder, ViewColumn};

/// Object kinds as recorded in the `type` column of `sqlite_master`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterType {
    /// A table.
    Table,
    /// An index.
    Index,
    /// A view.
    View,
    /// A trigger.
    Trigger,
}

impl MasterType {
    /// The `sqlite_master.type` value.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Index => "index",
            Self::View => "view",
            Self::Trigger => "trigger",
        }
    }
}

/// A schema object that can be created and dropped.
pub trait Creatable {
    /// The kind of object.
    fn master_type(&self) -> MasterType;

    /// The object name.
    fn identity(&self) -> &Identity;

    /// Statements creating the object, in execution order.
    fn create_statements(&self, temporary: bool) -> Vec<StatementSeed>;

    /// Statements dropping the object.
    fn drop_statements(&self) -> Vec<StatementSeed>;

    /// Creates the object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Executor`](crate::Error::Executor) when a statement fails.
    fn create(&self, executor: &mut dyn SqlExecutor, temporary: bool) -> Result<()> {
        let statements = self.create_statements(temporary);
        info!(
            kind = self.master_type().as_sql(),
            name = %self.identity(),
            statements = statements.len(),
            "Creating schema object"
        );
        for statement in &statements {
            statement.run(executor)?;
        }
        Ok(())
    }

    /// Drops the object if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Executor`](crate::Error::Executor) when a statement fails.
    fn drop(&self, executor: &mut dyn SqlExecutor) -> Result<()> {
        info!(
            kind = self.master_type().as_sql(),
            name = %self.identity(),
            "Dropping schema object"
        );
        for statement in &self.drop_statements() {
            statement.run(executor)?;
        }
        Ok(())
    }

    /// Whether `sqlite_master` records an object of this kind and name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Executor`](crate::Error::Executor) when the lookup fails.
    fn exists(&self, executor: &mut dyn SqlExecutor) -> Result<bool> {
        let query = Query::raw(master_lookup());
        let count = query.long_for_query(executor, |args| {
            args.set(0, self.master_type().as_sql())?
                .set(1, self.identity().raw())?;
            Ok(())
        })?;
        Ok(count > 0)
    }
}

/// `SELECT COUNT(*) FROM sqlite_master WHERE type = ? AND name = ?`
fn master_lookup() -> StatementSeed {
    let text = TypeRef::new(TextType);
    let mut b = SqlBuilder::new();
    b.push("SELECT COUNT(*) FROM sqlite_master WHERE type = ")
        .push_bind(text.erased())
        .push(" AND name = ")
        .push_bind(text.erased());
    b.into_seed()
}
