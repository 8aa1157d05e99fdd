//! DELETE statements.

use crate::expr::{and_nodes, NodeRef, Predicate};
use crate::schema::Table;

use super::{SqlBuilder, StatementSeed};

/// A DELETE from one table, either of every row or of rows matching a
/// predicate.
#[derive(Debug, Clone)]
pub struct Delete {
    table: Table,
    filter: Option<NodeRef>,
}

impl Delete {
    /// Deletes every row of `table` unless restricted.
    #[must_use]
    pub fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            filter: None,
        }
    }

    /// Restricts the deleted rows, ANDed with any previous condition.
    #[must_use]
    pub fn where_clause(mut self, predicate: Predicate) -> Self {
        self.filter = Some(and_nodes(self.filter.take(), predicate.node().clone()));
        self
    }

    /// Compiles the statement.
    #[must_use]
    pub fn build(&self) -> StatementSeed {
        let mut b = SqlBuilder::new();
        b.push("DELETE FROM ").push_identity(self.table.identity());
        if let Some(filter) = &self.filter {
            b.push(" WHERE ").push_node(filter);
        }
        b.into_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bind, ExprExt};

    #[test]
    fn test_delete_forms() {
        let mut builder = Table::builder("MediaFile");
        let uri = builder.text("MediaUri", |c| c).unwrap();
        let table = builder.build().unwrap();
        assert_eq!(Delete::new(&table).build().sql(), r#"DELETE FROM "MediaFile""#);
        let seed = Delete::new(&table)
            .where_clause(uri.like(bind()))
            .build();
        assert_eq!(
            seed.sql(),
            r#"DELETE FROM "MediaFile" WHERE "MediaFile"."MediaUri" LIKE ?"#
        );
        assert_eq!(seed.arg_count(), 1);
    }
}
