//! Joined FROM clauses.

use std::sync::Arc;

use crate::error::ConstructionError;
use crate::expr::{and_nodes, AsExpr, BinaryOp, Node, NodeKind, NodeRef, Predicate, QueryAlias};
use crate::identity::Identity;
use crate::schema::Table;
use crate::types::{BoolType, TypeRef, ValueType};

use super::{ColumnSet, IntoColumnSet, Select, SelectItem, Selectable, SqlBuilder};

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT JOIN.
    Left,
    /// CROSS JOIN.
    Cross,
}

impl JoinType {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct JoinPart {
    join_type: JoinType,
    source: Arc<dyn ColumnSet>,
    on: Option<NodeRef>,
}

/// A FROM clause joining tables, aliased tables and subqueries.
///
/// Subqueries joined with [`join_query`](Self::join_query) get synthetic
/// aliases `q0`, `q1`, ... in join order.
#[derive(Debug, Clone)]
pub struct Join {
    first: Arc<dyn ColumnSet>,
    tables: Vec<Table>,
    parts: Vec<JoinPart>,
    next_alias: usize,
    last_query_alias: Option<QueryAlias>,
}

impl Join {
    /// Starts a join from `source`.
    #[must_use]
    pub fn new(source: impl IntoColumnSet) -> Self {
        let first = source.into_column_set();
        let tables = first.as_table().cloned().into_iter().collect();
        Self {
            first,
            tables,
            parts: Vec::new(),
            next_alias: 0,
            last_query_alias: None,
        }
    }

    fn push(mut self, join_type: JoinType, source: Arc<dyn ColumnSet>, on: Option<NodeRef>) -> Self {
        if let Some(table) = source.as_table() {
            self.tables.push(table.clone());
        }
        self.parts.push(JoinPart {
            join_type,
            source,
            on,
        });
        self
    }

    /// Joins `source` on an explicit condition.
    #[must_use]
    pub fn join(self, source: impl IntoColumnSet, join_type: JoinType, on: Predicate) -> Self {
        self.push(join_type, source.into_column_set(), Some(on.node().clone()))
    }

    /// Joins `source` on `left = right`.
    #[must_use]
    pub fn join_on<T: ValueType>(
        self,
        source: impl IntoColumnSet,
        join_type: JoinType,
        left: &impl AsExpr<T>,
        right: &impl AsExpr<T>,
    ) -> Self {
        let on = equals(left.as_expr().node(), right.as_expr().node());
        self.push(join_type, source.into_column_set(), Some(on))
    }

    /// `CROSS JOIN source`.
    #[must_use]
    pub fn cross_join(self, source: impl IntoColumnSet) -> Self {
        self.push(JoinType::Cross, source.into_column_set(), None)
    }

    /// `INNER JOIN table`, on the foreign key linking it to the join.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::NoJoinCondition`] when no foreign key
    /// links `table` to a joined table, and
    /// [`ConstructionError::AmbiguousJoinCondition`] when several do.
    pub fn inner_join(self, table: &Table) -> Result<Self, ConstructionError> {
        self.join_by_foreign_key(table, JoinType::Inner)
    }

    /// `LEFT JOIN table`, on the foreign key linking it to the join.
    ///
    /// # Errors
    ///
    /// Same as [`inner_join`](Self::inner_join).
    pub fn left_join(self, table: &Table) -> Result<Self, ConstructionError> {
        self.join_by_foreign_key(table, JoinType::Left)
    }

    fn join_by_foreign_key(
        self,
        table: &Table,
        join_type: JoinType,
    ) -> Result<Self, ConstructionError> {
        let mut candidates = Vec::new();
        for joined in self.tables.iter().filter(|joined| *joined != table) {
            for fk in table.foreign_keys() {
                if fk.referenced_table() == joined.identity() {
                    candidates.push(equals(fk.referenced_node(), fk.column_node()));
                }
            }
            for fk in joined.foreign_keys() {
                if fk.referenced_table() == table.identity() {
                    candidates.push(equals(fk.column_node(), fk.referenced_node()));
                }
            }
        }
        let left = || {
            self.tables
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        if candidates.len() > 1 {
            return Err(ConstructionError::AmbiguousJoinCondition {
                left: left(),
                right: table.name().to_owned(),
            });
        }
        let Some(on) = candidates.pop() else {
            return Err(ConstructionError::NoJoinCondition {
                left: left(),
                right: table.name().to_owned(),
            });
        };
        Ok(self.push(join_type, Arc::new(table.clone()), Some(on)))
    }

    /// Joins a subquery under the next synthetic alias.
    ///
    /// `on` receives the alias so the condition can refer to the
    /// subquery's columns. The alias stays available through
    /// [`last_query_alias`](Self::last_query_alias).
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `on`.
    pub fn join_query<F>(
        mut self,
        join_type: JoinType,
        query: &Select,
        on: F,
    ) -> Result<Self, ConstructionError>
    where
        F: FnOnce(&QueryAlias) -> Result<Predicate, ConstructionError>,
    {
        let name = Identity::new(format!("q{}", self.next_alias));
        self.next_alias += 1;
        let alias = QueryAlias::new(name, Arc::clone(query.core()));
        let condition = on(&alias)?;
        self.last_query_alias = Some(alias.clone());
        Ok(self.push(join_type, Arc::new(alias), Some(condition.node().clone())))
    }

    /// The alias given to the most recent [`join_query`](Self::join_query).
    #[must_use]
    pub const fn last_query_alias(&self) -> Option<&QueryAlias> {
        self.last_query_alias.as_ref()
    }

    /// Adds a condition to the most recent join.
    #[must_use]
    pub fn and_on(mut self, predicate: Predicate) -> Self {
        if let Some(part) = self.parts.last_mut() {
            part.on = Some(and_nodes(part.on.take(), predicate.node().clone()));
        }
        self
    }

    /// Selects from the join.
    #[must_use]
    pub fn select(&self, items: &[&dyn Selectable]) -> Select {
        Select::new(self, items)
    }

    /// Selects every column of every joined source.
    #[must_use]
    pub fn select_all(&self) -> Select {
        Select::all(self)
    }
}

fn equals(left: &NodeRef, right: &NodeRef) -> NodeRef {
    Node::new(
        NodeKind::Binary {
            op: BinaryOp::Eq,
            left: Arc::clone(left),
            right: Arc::clone(right),
        },
        TypeRef::new(BoolType).erased().clone(),
    )
}

impl ColumnSet for Join {
    fn append_from(&self, b: &mut SqlBuilder) {
        self.first.append_from(b);
        for part in &self.parts {
            b.push(" ").push(part.join_type.as_sql()).push(" ");
            part.source.append_from(b);
            if let Some(on) = &part.on {
                b.push(" ON ").push_node(on);
            }
        }
    }

    fn select_items(&self) -> Vec<SelectItem> {
        let mut items = self.first.select_items();
        for part in &self.parts {
            items.extend(part.source.select_items());
        }
        items
    }
}
