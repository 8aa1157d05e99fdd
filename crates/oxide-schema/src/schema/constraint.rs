//! Column and table constraints.

use std::sync::Arc;

use crate::expr::NodeRef;
use crate::identity::Identity;

use super::ColumnDef;

/// Conflict resolution algorithm, shared by constraint conflict clauses and
/// `INSERT OR ...` / `UPDATE OR ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OnConflict {
    /// No explicit algorithm (the engine default, ABORT).
    #[default]
    Unspecified,
    /// Replace the conflicting row.
    Replace,
    /// Skip the offending row.
    Ignore,
    /// Abort the statement.
    Abort,
    /// Fail the statement, keeping prior changes.
    Fail,
    /// Roll back the transaction.
    Rollback,
}

impl OnConflict {
    /// Returns the SQL keyword, `None` when unspecified.
    #[must_use]
    pub const fn as_sql(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::Replace => Some("REPLACE"),
            Self::Ignore => Some("IGNORE"),
            Self::Abort => Some("ABORT"),
            Self::Fail => Some("FAIL"),
            Self::Rollback => Some("ROLLBACK"),
        }
    }

    /// `INSERT` or `INSERT OR <algorithm>`.
    #[must_use]
    pub const fn insert_keyword(self) -> &'static str {
        match self {
            Self::Unspecified => "INSERT",
            Self::Replace => "INSERT OR REPLACE",
            Self::Ignore => "INSERT OR IGNORE",
            Self::Abort => "INSERT OR ABORT",
            Self::Fail => "INSERT OR FAIL",
            Self::Rollback => "INSERT OR ROLLBACK",
        }
    }

    /// `UPDATE` or `UPDATE OR <algorithm>`.
    #[must_use]
    pub const fn update_keyword(self) -> &'static str {
        match self {
            Self::Unspecified => "UPDATE",
            Self::Replace => "UPDATE OR REPLACE",
            Self::Ignore => "UPDATE OR IGNORE",
            Self::Abort => "UPDATE OR ABORT",
            Self::Fail => "UPDATE OR FAIL",
            Self::Rollback => "UPDATE OR ROLLBACK",
        }
    }

    pub(crate) fn append_clause(self, sql: &mut String) {
        if let Some(algorithm) = self.as_sql() {
            sql.push_str(" ON CONFLICT ");
            sql.push_str(algorithm);
        }
    }
}

/// Collating sequence of a TEXT column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collate {
    /// Byte-wise comparison.
    Binary,
    /// ASCII case-insensitive comparison.
    NoCase,
    /// Binary comparison ignoring trailing spaces.
    RTrim,
    /// An application-defined collation.
    Custom(String),
}

impl Collate {
    /// Maps a collation name, recognizing the built-in ones in any case.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "BINARY" => Self::Binary,
            "NOCASE" => Self::NoCase,
            "RTRIM" => Self::RTrim,
            _ => Self::Custom(name.to_owned()),
        }
    }

    /// Returns the collation name as written in DDL.
    #[must_use]
    pub fn as_sql(&self) -> &str {
        match self {
            Self::Binary => "BINARY",
            Self::NoCase => "NOCASE",
            Self::RTrim => "RTRIM",
            Self::Custom(name) => name,
        }
    }
}

/// Foreign key action on delete/update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForeignKeyAction {
    /// No action.
    #[default]
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A constraint written inline in a column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnConstraint {
    PrimaryKey {
        descending: Option<bool>,
        on_conflict: OnConflict,
        auto_increment: bool,
    },
    Unique {
        on_conflict: OnConflict,
    },
    Collate(Collate),
}

impl ColumnConstraint {
    pub(crate) fn append_to(&self, sql: &mut String) {
        match self {
            Self::PrimaryKey {
                descending,
                on_conflict,
                auto_increment,
            } => {
                sql.push_str(" PRIMARY KEY");
                match descending {
                    Some(true) => sql.push_str(" DESC"),
                    Some(false) => sql.push_str(" ASC"),
                    None => {}
                }
                on_conflict.append_clause(sql);
                if *auto_increment {
                    sql.push_str(" AUTOINCREMENT");
                }
            }
            Self::Unique { on_conflict } => {
                sql.push_str(" UNIQUE");
                on_conflict.append_clause(sql);
            }
            Self::Collate(collate) => {
                sql.push_str(" COLLATE ");
                sql.push_str(collate.as_sql());
            }
        }
    }
}

/// A foreign key from a column to a column of another (or the same) table.
#[derive(Debug, Clone)]
pub struct ForeignKeyConstraint {
    name: Identity,
    column: Arc<ColumnDef>,
    referenced: Arc<ColumnDef>,
    on_delete: ForeignKeyAction,
    on_update: ForeignKeyAction,
}

impl ForeignKeyConstraint {
    pub(crate) const fn new(
        name: Identity,
        column: Arc<ColumnDef>,
        referenced: Arc<ColumnDef>,
        on_delete: ForeignKeyAction,
        on_update: ForeignKeyAction,
    ) -> Self {
        Self {
            name,
            column,
            referenced,
            on_delete,
            on_update,
        }
    }

    /// Default constraint name: `fk_<table>_<column>_<referenced column>`.
    pub(crate) fn default_name(table: &str, column: &str, referenced_column: &str) -> Identity {
        Identity::new(format!("fk_{table}_{column}_{referenced_column}"))
    }

    /// The constraint name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// The referencing table.
    #[must_use]
    pub fn table(&self) -> &Identity {
        self.column.table()
    }

    /// The referencing column.
    #[must_use]
    pub fn column(&self) -> &Identity {
        self.column.name()
    }

    /// The referenced table.
    #[must_use]
    pub fn referenced_table(&self) -> &Identity {
        self.referenced.table()
    }

    /// The referenced column.
    #[must_use]
    pub fn referenced_column(&self) -> &Identity {
        self.referenced.name()
    }

    /// ON DELETE action.
    #[must_use]
    pub const fn on_delete(&self) -> ForeignKeyAction {
        self.on_delete
    }

    /// ON UPDATE action.
    #[must_use]
    pub const fn on_update(&self) -> ForeignKeyAction {
        self.on_update
    }

    pub(crate) fn column_node(&self) -> &NodeRef {
        self.column.node()
    }

    pub(crate) fn referenced_node(&self) -> &NodeRef {
        self.referenced.node()
    }

    pub(crate) fn append_to(&self, sql: &mut String) {
        sql.push_str("CONSTRAINT ");
        sql.push_str(self.name.quoted());
        sql.push_str(" FOREIGN KEY (");
        sql.push_str(self.column.name().quoted());
        sql.push_str(") REFERENCES ");
        sql.push_str(self.referenced.table().quoted());
        sql.push('(');
        sql.push_str(self.referenced.name().quoted());
        sql.push(')');
        if self.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(self.on_delete.as_sql());
        }
        if self.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(self.on_update.as_sql());
        }
    }
}

/// A named CHECK constraint. Its expression is stored as rendered SQL and
/// never contains bind placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraint {
    name: Identity,
    sql: String,
}

impl CheckConstraint {
    pub(crate) const fn new(name: Identity, sql: String) -> Self {
        Self { name, sql }
    }

    /// The constraint name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// The checked expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.sql
    }

    pub(crate) fn append_to(&self, sql: &mut String) {
        sql.push_str("CONSTRAINT ");
        sql.push_str(self.name.quoted());
        sql.push_str(" CHECK (");
        sql.push_str(&self.sql);
        sql.push(')');
    }
}
