//! Reading table descriptions back from a live database.
//!
//! [`describe_table`] reads `PRAGMA table_info` through the executor. The
//! resulting [`TableDescription`] is plain data so it can be stored or
//! compared by the caller; verifying it against a [`Table`](super::Table)
//! is left to the host.

use serde::{Deserialize, Serialize};

use crate::builder::StatementSeed;
use crate::error::{Result, TypeError};
use crate::executor::{Row, SqlExecutor};
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{StorageClass, ValueRef};

/// Column affinity derived from a declared type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// INTEGER affinity.
    Integer,
    /// REAL affinity.
    Real,
    /// TEXT affinity.
    Text,
    /// BLOB affinity (also an empty declared type).
    Blob,
    /// NUMERIC affinity.
    Numeric,
}

impl FieldType {
    /// Applies SQLite's affinity rules to a declared type name.
    #[must_use]
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }

    /// The storage class a codec for this affinity declares, if any.
    #[must_use]
    pub const fn storage_class(self) -> Option<StorageClass> {
        match self {
            Self::Integer => Some(StorageClass::Integer),
            Self::Real => Some(StorageClass::Real),
            Self::Text => Some(StorageClass::Text),
            Self::Blob => Some(StorageClass::Blob),
            Self::Numeric => None,
        }
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Zero-based column position.
    pub ordinal: i64,
    /// Column name.
    pub name: String,
    /// Affinity of the declared type.
    pub field_type: FieldType,
    /// Whether the column is declared NOT NULL.
    pub not_null: bool,
    /// The DEFAULT expression as written, if any.
    pub default_value: Option<String>,
    /// One-based position in the primary key, 0 when not part of it.
    pub pk_index: i64,
}

/// The columns of a table as the engine reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    /// Table name.
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnMetadata>,
}

impl TableDescription {
    /// Looks a column up by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the engine knows the table at all.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }
}

fn value(row: &dyn Row, index: usize) -> std::result::Result<ValueRef<'_>, TypeError> {
    row.value(index).ok_or(TypeError::MissingColumn { index })
}

fn integer(row: &dyn Row, index: usize) -> std::result::Result<i64, TypeError> {
    match value(row, index)? {
        ValueRef::Integer(n) => Ok(n),
        other => Err(TypeError::TypeMismatch {
            expected: StorageClass::Integer,
            found: other.storage_class(),
        }),
    }
}

fn optional_text(row: &dyn Row, index: usize) -> std::result::Result<Option<String>, TypeError> {
    match value(row, index)? {
        ValueRef::Null => Ok(None),
        ValueRef::Text(text) => Ok(Some(text.to_owned())),
        other => Ok(Some(other.to_string())),
    }
}

fn column_metadata(row: &dyn Row) -> std::result::Result<ColumnMetadata, TypeError> {
    Ok(ColumnMetadata {
        ordinal: integer(row, 0)?,
        name: optional_text(row, 1)?.unwrap_or_default(),
        field_type: FieldType::from_declared_type(&optional_text(row, 2)?.unwrap_or_default()),
        not_null: integer(row, 3)? != 0,
        default_value: optional_text(row, 4)?,
        pk_index: integer(row, 5)?,
    })
}

/// Describes `table` from `PRAGMA table_info`. A table that does not exist
/// yields a description without columns.
///
/// # Errors
///
/// Returns [`Error::Executor`](crate::Error::Executor) when the pragma
/// fails, or a [`TypeError`] when its rows have an unexpected shape.
pub fn describe_table(executor: &mut dyn SqlExecutor, table: &str) -> Result<TableDescription> {
    let pragma = format!("PRAGMA table_info({})", Identity::new(table).quoted());
    let query = Query::raw(StatementSeed::raw(pragma));
    let mut columns = Vec::new();
    query.for_each(
        executor,
        |_| Ok(()),
        |cursor| {
            columns.push(column_metadata(cursor.row())?);
            Ok(())
        },
    )?;
    Ok(TableDescription {
        name: table.to_owned(),
        columns,
    })
}
