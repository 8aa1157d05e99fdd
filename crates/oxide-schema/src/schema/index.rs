//! Indices.

use crate::builder::StatementSeed;
use crate::identity::Identity;

use super::{Creatable, MasterType};

/// An index over one or more columns of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: Identity,
    table: Identity,
    columns: Vec<Identity>,
    unique: bool,
}

impl Index {
    pub(crate) const fn new(
        name: Identity,
        table: Identity,
        columns: Vec<Identity>,
        unique: bool,
    ) -> Self {
        Self {
            name,
            table,
            columns,
            unique,
        }
    }

    /// Default index name: `<table>_<col>[_<col>...]`, suffixed `_unique`
    /// for unique indices.
    pub(crate) fn default_name(table: &Identity, columns: &[Identity], unique: bool) -> Identity {
        let mut name = String::from(table.raw());
        for column in columns {
            name.push('_');
            name.push_str(column.raw());
        }
        if unique {
            name.push_str("_unique");
        }
        Identity::new(name)
    }

    /// The index name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// The indexed table.
    #[must_use]
    pub const fn table(&self) -> &Identity {
        &self.table
    }

    /// The indexed columns, in order.
    #[must_use]
    pub fn columns(&self) -> &[Identity] {
        &self.columns
    }

    /// Whether the index is UNIQUE.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// The CREATE INDEX statement.
    #[must_use]
    pub fn ddl(&self) -> String {
        let mut sql = String::from(if self.unique {
            "CREATE UNIQUE INDEX IF NOT EXISTS "
        } else {
            "CREATE INDEX IF NOT EXISTS "
        });
        sql.push_str(self.name.quoted());
        sql.push_str(" ON ");
        sql.push_str(self.table.quoted());
        sql.push('(');
        let columns: Vec<&str> = self.columns.iter().map(Identity::quoted).collect();
        sql.push_str(&columns.join(", "));
        sql.push(')');
        sql
    }
}

impl Creatable for Index {
    fn master_type(&self) -> MasterType {
        MasterType::Index
    }

    fn identity(&self) -> &Identity {
        &self.name
    }

    fn create_statements(&self, _temporary: bool) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(self.ddl())]
    }

    fn drop_statements(&self) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(format!(
            "DROP INDEX IF EXISTS {}",
            self.name.quoted()
        ))]
    }
}
