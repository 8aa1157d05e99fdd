//! Column assignments for INSERT and UPDATE.

use crate::error::ConstructionError;
use crate::expr::{Expr, IntoOperand, NodeRef};
use crate::identity::Identity;
use crate::schema::{Column, ColumnDef};
use crate::types::ValueType;

/// Collects `column = value` assignments for one target table.
///
/// A repeated assignment replaces the earlier value in place. Assigning a
/// column of another table is recorded and reported when the statement is
/// built.
#[derive(Debug)]
pub struct ColumnValues {
    table: Identity,
    entries: Vec<(Identity, NodeRef)>,
    error: Option<ConstructionError>,
}

impl ColumnValues {
    pub(crate) const fn new(table: Identity) -> Self {
        Self {
            table,
            entries: Vec::new(),
            error: None,
        }
    }

    fn assign(&mut self, def: &ColumnDef, node: NodeRef) -> &mut Self {
        if def.table() != &self.table {
            self.error.get_or_insert_with(|| ConstructionError::ForeignColumnAssignment {
                table: self.table.raw().to_owned(),
                column: def.qualified_name(),
            });
            return self;
        }
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == def.name()) {
            entry.1 = node;
        } else {
            self.entries.push((def.name().clone(), node));
        }
        self
    }

    /// Assigns a literal value, rendered through the column's codec.
    pub fn set<T: ValueType>(&mut self, column: &Column<T>, value: impl Into<T>) -> &mut Self {
        let value = Expr::value(&value.into(), column.type_ref());
        self.assign(column.def(), value.node().clone())
    }

    /// Assigns an expression, such as another column or `bind()`.
    pub fn set_expr<T: ValueType>(
        &mut self,
        column: &Column<T>,
        value: impl IntoOperand<T>,
    ) -> &mut Self {
        let value = value.into_operand(column.type_ref());
        self.assign(column.def(), value.node().clone())
    }

    /// Assigns a bind placeholder typed by the column's codec.
    pub fn bind<T: ValueType>(&mut self, column: &Column<T>) -> &mut Self {
        let value = Expr::placeholder(column.type_ref());
        self.assign(column.def(), value.node().clone())
    }

    /// Number of distinct columns assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn finish(self) -> Result<Vec<(Identity, NodeRef)>, ConstructionError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.entries),
        }
    }
}
