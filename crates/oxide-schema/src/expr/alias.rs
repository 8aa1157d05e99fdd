//! Named expressions and named subqueries.

use std::fmt;
use std::sync::Arc;

use crate::builder::select::SelectCore;
use crate::builder::{ColumnSet, SelectItem, Selectable, SqlBuilder};
use crate::error::ConstructionError;
use crate::identity::Identity;
use crate::types::{TypeRef, ValueType};

use super::{AsExpr, Expr, ExprId, IntoOperand, Node, NodeKind, NodeRef};

/// An expression named in a select list.
///
/// Selected, it renders as `expr AS "name"`. Used as an expression
/// anywhere else (ORDER BY, HAVING, a view column), it renders as the bare
/// quoted name.
pub struct ExprAlias<T> {
    name: Identity,
    aliased: Expr<T>,
    reference: Expr<T>,
}

impl<T: ValueType> ExprAlias<T> {
    pub(crate) fn new(name: &str, aliased: Expr<T>) -> Self {
        let name = Identity::new(name);
        let reference = Expr::from_kind(
            NodeKind::AliasRef(name.clone()),
            aliased.type_ref().clone(),
        );
        Self {
            name,
            aliased,
            reference,
        }
    }

    /// The alias name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// The expression being named.
    #[must_use]
    pub const fn aliased(&self) -> &Expr<T> {
        &self.aliased
    }
}

impl<T> Clone for ExprAlias<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            aliased: self.aliased.clone(),
            reference: self.reference.clone(),
        }
    }
}

impl<T> fmt::Debug for ExprAlias<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprAlias")
            .field("name", &self.name)
            .field("aliased", &self.aliased)
            .finish()
    }
}

impl<T> AsExpr<T> for ExprAlias<T> {
    fn as_expr(&self) -> &Expr<T> {
        &self.reference
    }
}

impl<T: ValueType> IntoOperand<T> for &ExprAlias<T> {
    fn into_operand(self, _ty: &TypeRef<T>) -> Expr<T> {
        self.reference.clone()
    }
}

impl<T: ValueType> Selectable for ExprAlias<T> {
    fn select_item(&self) -> SelectItem {
        SelectItem::aliased(
            self.aliased.node().clone(),
            self.name.clone(),
            self.reference.node().clone(),
        )
    }
}

#[derive(Debug, Clone)]
struct AliasedColumn {
    source: ExprId,
    node: NodeRef,
}

/// A subquery given a name so it can be joined or selected from.
///
/// Columns of the subquery are reached through [`get`](Self::get), which
/// maps an expression selected by the inner query to `"alias"."column"`.
/// Repeated lookups return the same expression id, so results read through
/// the alias map back consistently.
#[derive(Debug, Clone)]
pub struct QueryAlias {
    name: Identity,
    query: Arc<SelectCore>,
    columns: Vec<AliasedColumn>,
}

impl QueryAlias {
    pub(crate) fn new(name: Identity, query: Arc<SelectCore>) -> Self {
        let columns = query
            .items()
            .iter()
            .filter_map(|item| {
                let exposed = item.exposed_name()?;
                let node = Node::new(
                    NodeKind::Column {
                        table: name.clone(),
                        column: exposed.clone(),
                    },
                    item.node().ty().clone(),
                );
                Some(AliasedColumn {
                    source: item.key_id(),
                    node,
                })
            })
            .collect();
        Self {
            name,
            query,
            columns,
        }
    }

    /// The alias name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// Refers to an expression selected by the aliased query.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::NotInQueryAlias`] when the expression is
    /// not a named result column of the query.
    pub fn get<T: ValueType, E: AsExpr<T> + ?Sized>(
        &self,
        expr: &E,
    ) -> Result<Expr<T>, ConstructionError> {
        let expr = expr.as_expr();
        self.columns
            .iter()
            .find(|column| column.source == expr.id())
            .map(|column| Expr::from_node(column.node.clone(), expr.type_ref().clone()))
            .ok_or_else(|| ConstructionError::NotInQueryAlias {
                alias: self.name.raw().to_owned(),
                expression: expr.to_sql(),
            })
    }
}

impl ColumnSet for QueryAlias {
    fn append_from(&self, b: &mut SqlBuilder) {
        b.push("(");
        self.query.append_to(b);
        b.push(") AS ").push_identity(&self.name);
    }

    fn select_items(&self) -> Vec<SelectItem> {
        self.columns
            .iter()
            .map(|column| SelectItem::plain(column.node.clone()))
            .collect()
    }
}
