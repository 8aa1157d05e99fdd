//! Views.

use std::fmt;
use std::sync::Arc;

use crate::builder::{
    ColumnSet, Select, SelectItem, Selectable, SqlBuilder, StatementSeed,
};
use crate::error::ConstructionError;
use crate::expr::{AsExpr, Expr, ExprId, IntoOperand, Node, NodeKind, NodeRef};
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{TypeRef, ValueType};

use super::{Creatable, MasterType};

/// A column exposed by a view under a declared name.
pub struct ViewColumn<T> {
    name: Identity,
    expr: Expr<T>,
}

impl<T: ValueType> ViewColumn<T> {
    /// The exposed name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }
}

impl<T> Clone for ViewColumn<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            expr: self.expr.clone(),
        }
    }
}

impl<T> fmt::Debug for ViewColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewColumn")
            .field("name", &self.name.raw())
            .field("id", &self.expr.id())
            .finish()
    }
}

impl<T> AsExpr<T> for ViewColumn<T> {
    fn as_expr(&self) -> &Expr<T> {
        &self.expr
    }
}

impl<T> Selectable for ViewColumn<T> {
    fn select_item(&self) -> SelectItem {
        SelectItem::plain(self.expr.node().clone())
    }
}

impl<T: ValueType> IntoOperand<T> for &ViewColumn<T> {
    fn into_operand(self, _ty: &TypeRef<T>) -> Expr<T> {
        self.expr.clone()
    }
}

/// Builds a [`View`] over a compiled select.
///
/// Declaring columns is optional; when none are declared the view exposes
/// the query's result names. A declared column names the select item it
/// was declared from, whatever the call order; every item needs exactly
/// one name.
#[derive(Debug)]
pub struct ViewBuilder {
    name: Identity,
    seed: StatementSeed,
    items: Vec<SelectItem>,
    columns: Vec<DeclaredColumn>,
    temporary: bool,
}

#[derive(Debug)]
struct DeclaredColumn {
    name: Identity,
    node: NodeRef,
    source: ExprId,
    source_sql: String,
}

impl ViewBuilder {
    /// A view over `select`.
    #[must_use]
    pub fn new(name: &str, select: &Select) -> Self {
        Self::from_query(name, &select.to_query())
    }

    /// A view over a previously built query.
    #[must_use]
    pub fn from_query(name: &str, query: &Query) -> Self {
        Self {
            name: Identity::new(name),
            seed: query.seed().clone(),
            items: query.items().to_vec(),
            columns: Vec::new(),
            temporary: false,
        }
    }

    /// Exposes the select item `source` under `name`.
    pub fn column<T: ValueType, E: AsExpr<T> + ?Sized>(
        &mut self,
        name: &str,
        source: &E,
    ) -> ViewColumn<T> {
        let name = Identity::new(name);
        let source = source.as_expr();
        let expr = Expr::from_kind(
            NodeKind::Column {
                table: self.name.clone(),
                column: name.clone(),
            },
            source.type_ref().clone(),
        );
        self.columns.push(DeclaredColumn {
            name: name.clone(),
            node: expr.node().clone(),
            source: source.id(),
            source_sql: source.to_sql(),
        });
        ViewColumn { name, expr }
    }

    /// Creates the view as TEMP.
    #[must_use]
    pub const fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Finishes the view.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ViewColumnCount`] when declared columns
    /// do not match the select width,
    /// [`ConstructionError::InvalidViewColumn`] when a declared column's
    /// source is not selected or is already named, and
    /// [`ConstructionError::UnexpectedBindArgument`] when the query has
    /// bind placeholders.
    pub fn build(self) -> Result<View, ConstructionError> {
        if self.seed.has_bind_args() {
            return Err(ConstructionError::UnexpectedBindArgument {
                object: "view",
                name: self.name.raw().to_owned(),
                sql: self.seed.sql().to_owned(),
            });
        }
        let declared = !self.columns.is_empty();
        if declared && self.columns.len() != self.items.len() {
            return Err(ConstructionError::ViewColumnCount {
                view: self.name.raw().to_owned(),
                declared: self.columns.len(),
                selected: self.items.len(),
            });
        }
        let exposed: Vec<ExposedColumn> = if declared {
            map_declared(&self.name, &self.items, self.columns)?
        } else {
            self.items
                .iter()
                .filter_map(|item| {
                    let column = item.exposed_name()?.clone();
                    let node = Node::new(
                        NodeKind::Column {
                            table: self.name.clone(),
                            column,
                        },
                        item.node().ty().clone(),
                    );
                    Some(ExposedColumn {
                        source: item.key_id(),
                        node,
                    })
                })
                .collect()
        };
        Ok(View {
            inner: Arc::new(ViewInner {
                identity: self.name,
                declared,
                exposed,
                sql: self.seed.sql().to_owned(),
                temporary: self.temporary,
            }),
        })
    }
}

/// Places each declared column at the position of its select item.
fn map_declared(
    view: &Identity,
    items: &[SelectItem],
    columns: Vec<DeclaredColumn>,
) -> Result<Vec<ExposedColumn>, ConstructionError> {
    let mut slots: Vec<Option<ExposedColumn>> = items.iter().map(|_| None).collect();
    for column in columns {
        let free = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.key_id() == column.source)
            .map(|(i, _)| i)
            .find(|&i| slots[i].is_none());
        let Some(i) = free else {
            let reason = if items.iter().any(|item| item.key_id() == column.source) {
                format!("{} is already exposed by another column", column.source_sql)
            } else {
                format!("{} is not selected by the view's query", column.source_sql)
            };
            return Err(ConstructionError::InvalidViewColumn {
                view: view.raw().to_owned(),
                column: column.name.raw().to_owned(),
                reason,
            });
        };
        slots[i] = Some(ExposedColumn {
            source: column.source,
            node: column.node,
        });
    }
    Ok(slots.into_iter().flatten().collect())
}

#[derive(Debug)]
struct ExposedColumn {
    source: ExprId,
    node: NodeRef,
}

#[derive(Debug)]
struct ViewInner {
    identity: Identity,
    declared: bool,
    exposed: Vec<ExposedColumn>,
    sql: String,
    temporary: bool,
}

/// An immutable view definition.
#[derive(Debug, Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

impl View {
    /// The view name.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// The query the view stores.
    #[must_use]
    pub fn query_sql(&self) -> &str {
        &self.inner.sql
    }

    /// Refers to a result column of the view's query through the view,
    /// rendered `"View"."column"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ForeignColumn`] when `expr` is not a
    /// named result of the view's query.
    pub fn get<T: ValueType, E: AsExpr<T> + ?Sized>(
        &self,
        expr: &E,
    ) -> Result<Expr<T>, ConstructionError> {
        let expr = expr.as_expr();
        self.inner
            .exposed
            .iter()
            .find(|column| column.source == expr.id())
            .map(|column| Expr::from_node(column.node.clone(), expr.type_ref().clone()))
            .ok_or_else(|| ConstructionError::ForeignColumn {
                table: self.inner.identity.raw().to_owned(),
                column: expr.to_sql(),
            })
    }

    /// Selects from the view; every exposed column when `items` is empty.
    #[must_use]
    pub fn select(&self, items: &[&dyn Selectable]) -> Select {
        Select::new(self, items)
    }

    /// The CREATE VIEW statement.
    #[must_use]
    pub fn ddl(&self, temporary: bool) -> String {
        let mut sql = String::from(if temporary || self.inner.temporary {
            "CREATE TEMP VIEW IF NOT EXISTS "
        } else {
            "CREATE VIEW IF NOT EXISTS "
        });
        sql.push_str(self.inner.identity.quoted());
        if self.inner.declared {
            let columns: Vec<&str> = self
                .inner
                .exposed
                .iter()
                .filter_map(|column| column.node.column_name().map(Identity::quoted))
                .collect();
            sql.push_str(" (");
            sql.push_str(&columns.join(", "));
            sql.push(')');
        }
        sql.push_str(" AS ");
        sql.push_str(&self.inner.sql);
        sql
    }
}

impl ColumnSet for View {
    fn append_from(&self, b: &mut SqlBuilder) {
        b.push_identity(&self.inner.identity);
    }

    fn select_items(&self) -> Vec<SelectItem> {
        self.inner
            .exposed
            .iter()
            .map(|column| SelectItem::plain(column.node.clone()))
            .collect()
    }
}

impl Creatable for View {
    fn master_type(&self) -> MasterType {
        MasterType::View
    }

    fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    fn create_statements(&self, temporary: bool) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(self.ddl(temporary))]
    }

    fn drop_statements(&self) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(format!(
            "DROP VIEW IF EXISTS {}",
            self.inner.identity.quoted()
        ))]
    }
}
