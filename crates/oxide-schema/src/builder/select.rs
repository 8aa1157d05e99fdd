//! SELECT statements.

use std::collections::HashSet;
use std::sync::Arc;

use crate::expr::{and_nodes, AsExpr, Expr, ExprId, NodeKind, NodeRef, Predicate, QueryAlias};
use crate::identity::Identity;
use crate::query::Query;
use crate::types::ValueType;

use super::{ColumnSet, IntoColumnSet, SqlBuilder, StatementSeed};

/// Sort direction. Always rendered explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One entry of a select list.
///
/// The `key` identifies the result column: for plain expressions it is the
/// expression itself, for aliased expressions it is the alias reference.
#[derive(Debug, Clone)]
pub struct SelectItem {
    node: NodeRef,
    alias: Option<Identity>,
    key: NodeRef,
}

impl SelectItem {
    pub(crate) fn plain(node: NodeRef) -> Self {
        Self {
            key: Arc::clone(&node),
            node,
            alias: None,
        }
    }

    pub(crate) const fn aliased(node: NodeRef, alias: Identity, key: NodeRef) -> Self {
        Self {
            node,
            alias: Some(alias),
            key,
        }
    }

    /// Id of the expression that reads this result column.
    #[must_use]
    pub fn key_id(&self) -> ExprId {
        self.key.id()
    }

    /// Id of the selected expression itself.
    #[must_use]
    pub fn expr_id(&self) -> ExprId {
        self.node.id()
    }

    /// The alias, if any.
    #[must_use]
    pub const fn alias(&self) -> Option<&Identity> {
        self.alias.as_ref()
    }

    /// The name the result column is known by outside the query.
    #[must_use]
    pub fn exposed_name(&self) -> Option<&Identity> {
        self.alias.as_ref().or_else(|| self.node.column_name())
    }

    pub(crate) const fn node(&self) -> &NodeRef {
        &self.node
    }

    pub(crate) const fn key(&self) -> &NodeRef {
        &self.key
    }

    pub(crate) fn append_to(&self, b: &mut SqlBuilder) {
        b.push_node(&self.node);
        if let Some(alias) = &self.alias {
            b.push(" AS ").push_identity(alias);
        }
    }
}

/// Anything that can appear in a select list.
pub trait Selectable {
    /// The select-list entry for this value.
    fn select_item(&self) -> SelectItem;
}

impl<T> Selectable for Expr<T> {
    fn select_item(&self) -> SelectItem {
        SelectItem::plain(self.node().clone())
    }
}

/// The compiled shape of a SELECT, shared by subqueries and aliases.
#[derive(Debug, Clone)]
pub(crate) struct SelectCore {
    source: Arc<dyn ColumnSet>,
    items: Vec<SelectItem>,
    distinct: bool,
    filter: Option<NodeRef>,
    group_by: Vec<NodeRef>,
    having: Option<NodeRef>,
    order_by: Vec<(NodeRef, SortOrder)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectCore {
    fn new(source: Arc<dyn ColumnSet>, items: Vec<SelectItem>) -> Self {
        let items = if items.is_empty() {
            source.select_items()
        } else {
            items
        };
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.key_id()))
            .collect();
        Self {
            source,
            items,
            distinct: false,
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub(crate) fn items(&self) -> &[SelectItem] {
        &self.items
    }

    pub(crate) fn append_to(&self, b: &mut SqlBuilder) {
        b.push(if self.distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        });
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            item.append_to(b);
        }
        b.push(" FROM ");
        self.source.append_from(b);
        if let Some(filter) = &self.filter {
            b.push(" WHERE ").push_node(filter);
        }
        if !self.group_by.is_empty() {
            b.push(" GROUP BY ");
            for (i, node) in self.group_by.iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_node(node);
            }
        }
        if let Some(having) = &self.having {
            b.push(" HAVING ").push_node(having);
        }
        if !self.order_by.is_empty() {
            b.push(" ORDER BY ");
            for (i, (node, order)) in self.order_by.iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_node(node).push(" ").push(order.as_sql());
            }
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                b.push(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => {
                b.push(&format!(" LIMIT {limit}"));
            }
            (None, Some(offset)) => {
                b.push(&format!(" LIMIT -1 OFFSET {offset}"));
            }
            (None, None) => {}
        }
    }
}

/// A SELECT statement under construction.
///
/// ```rust
/// use oxide_schema::{ExprExt, SortOrder, Table};
///
/// let mut builder = Table::builder("Album");
/// let id = builder.long("_id", |c| c.primary_key()).unwrap();
/// let name = builder.text("AlbumName", |c| c).unwrap();
/// let album = builder.build().unwrap();
///
/// let select = album
///     .select(&[&name])
///     .where_clause(id.gt(10))
///     .order_by(&name, SortOrder::Asc)
///     .limit(5);
/// assert_eq!(
///     select.to_sql(),
///     r#"SELECT "Album"."AlbumName" FROM "Album" WHERE "Album"."_id" > 10 ORDER BY "Album"."AlbumName" ASC LIMIT 5"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    core: Arc<SelectCore>,
}

impl Select {
    /// Selects `items` from `source`, or every column of `source` when
    /// `items` is empty. Repeated items are selected once.
    #[must_use]
    pub fn new(source: impl IntoColumnSet, items: &[&dyn Selectable]) -> Self {
        let items = items.iter().map(|item| item.select_item()).collect();
        Self {
            core: Arc::new(SelectCore::new(source.into_column_set(), items)),
        }
    }

    /// Selects every column of `source`.
    #[must_use]
    pub fn all(source: impl IntoColumnSet) -> Self {
        Self::new(source, &[])
    }

    fn core_mut(&mut self) -> &mut SelectCore {
        Arc::make_mut(&mut self.core)
    }

    pub(crate) const fn core(&self) -> &Arc<SelectCore> {
        &self.core
    }

    /// The de-duplicated select list.
    #[must_use]
    pub fn items(&self) -> &[SelectItem] {
        &self.core.items
    }

    /// `SELECT DISTINCT`.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.core_mut().distinct = true;
        self
    }

    /// Adds a WHERE condition, ANDed with any previous one.
    #[must_use]
    pub fn where_clause(mut self, predicate: Predicate) -> Self {
        let core = self.core_mut();
        core.filter = Some(and_nodes(core.filter.take(), predicate.node().clone()));
        self
    }

    /// Appends GROUP BY terms.
    #[must_use]
    pub fn group_by(mut self, terms: &[&dyn Selectable]) -> Self {
        let core = self.core_mut();
        core.group_by
            .extend(terms.iter().map(|term| term.select_item().key().clone()));
        self
    }

    /// Adds a HAVING condition, ANDed with any previous one.
    #[must_use]
    pub fn having(mut self, predicate: Predicate) -> Self {
        let core = self.core_mut();
        core.having = Some(and_nodes(core.having.take(), predicate.node().clone()));
        self
    }

    /// Appends an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, term: &dyn Selectable, order: SortOrder) -> Self {
        let key = term.select_item().key().clone();
        self.core_mut().order_by.push((key, order));
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.core_mut().limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.core_mut().offset = Some(offset);
        self
    }

    /// Names this query so it can be used as a FROM item.
    #[must_use]
    pub fn alias(&self, name: &str) -> QueryAlias {
        QueryAlias::new(Identity::new(name), Arc::clone(&self.core))
    }

    /// Uses this query as a scalar subquery `(SELECT ...)` whose value is
    /// decoded like `of`.
    #[must_use]
    pub fn scalar<T: ValueType, E: AsExpr<T> + ?Sized>(&self, of: &E) -> Expr<T> {
        Expr::from_kind(
            NodeKind::Subquery(Arc::clone(&self.core)),
            of.as_expr().type_ref().clone(),
        )
    }

    /// Compiles the statement.
    #[must_use]
    pub fn seed(&self) -> StatementSeed {
        let mut b = SqlBuilder::new();
        self.core.append_to(&mut b);
        b.into_seed()
    }

    /// Compiles the statement with its result-column mapping.
    #[must_use]
    pub fn to_query(&self) -> Query {
        Query::new(self.seed(), &self.core.items)
    }

    /// The SQL text.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.seed().sql().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bind, count_star, exists, ExprExt};
    use crate::schema::{Column, Table};
    use crate::types::StorageClass;

    fn album() -> (Table, Column<i64>, Column<String>, Column<i64>) {
        let mut builder = Table::builder("Album");
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        let name = builder.text("AlbumName", |c| c).unwrap();
        let year = builder.long("Year", |c| c).unwrap();
        (builder.build().unwrap(), id, name, year)
    }

    #[test]
    fn test_select_all_lists_columns() {
        let (album, ..) = album();
        assert_eq!(
            Select::all(&album).to_sql(),
            r#"SELECT "Album"."_id", "Album"."AlbumName", "Album"."Year" FROM "Album""#
        );
    }

    #[test]
    fn test_duplicate_items_selected_once() {
        let (album, id, name, _) = album();
        let select = album.select(&[&id, &name, &id]);
        assert_eq!(select.items().len(), 2);
        let a = name.alias("a");
        let b = name.alias("b");
        let select = album.select(&[&a, &b]);
        assert_eq!(
            select.to_sql(),
            r#"SELECT "Album"."AlbumName" AS "a", "Album"."AlbumName" AS "b" FROM "Album""#
        );
    }

    #[test]
    fn test_where_clauses_accumulate() {
        let (album, id, name, year) = album();
        let select = album
            .select(&[&id])
            .where_clause(name.eq(bind()))
            .where_clause(year.gt(1990).or(year.is_null()));
        assert_eq!(
            select.to_sql(),
            r#"SELECT "Album"."_id" FROM "Album" WHERE "Album"."AlbumName" = ? AND ("Album"."Year" > 1990 OR "Album"."Year" IS NULL)"#
        );
        assert_eq!(select.seed().arg_count(), 1);
    }

    #[test]
    fn test_group_by_having_order_by_alias() {
        let (album, _, _, year) = album();
        let total = count_star().alias("total");
        let select = album
            .select(&[&year, &total])
            .group_by(&[&year])
            .having(total.gt(1))
            .order_by(&total, SortOrder::Desc)
            .offset(10);
        assert_eq!(
            select.to_sql(),
            r#"SELECT "Album"."Year", COUNT(*) AS "total" FROM "Album" GROUP BY "Album"."Year" HAVING "total" > 1 ORDER BY "total" DESC LIMIT -1 OFFSET 10"#
        );
    }

    #[test]
    fn test_subqueries_keep_bind_order() {
        let (album, id, name, year) = album();
        let recent = album.select(&[&id]).where_clause(year.ge(bind()));
        let select = album
            .select(&[&name])
            .distinct()
            .where_clause(name.like(bind()))
            .where_clause(id.in_query(&recent))
            .where_clause(exists(&album.select(&[&id]).where_clause(id.eq(bind()))));
        let seed = select.seed();
        assert_eq!(
            seed.sql(),
            r#"SELECT DISTINCT "Album"."AlbumName" FROM "Album" WHERE "Album"."AlbumName" LIKE ? AND "Album"."_id" IN (SELECT "Album"."_id" FROM "Album" WHERE "Album"."Year" >= ?) AND EXISTS (SELECT "Album"."_id" FROM "Album" WHERE "Album"."_id" = ?)"#
        );
        let classes: Vec<_> = seed
            .types()
            .iter()
            .map(|ty| ty.info().storage_class())
            .collect();
        assert_eq!(
            classes,
            vec![
                StorageClass::Text,
                StorageClass::Integer,
                StorageClass::Integer,
            ]
        );
    }

    #[test]
    fn test_scalar_subquery() {
        let (album, id, _, year) = album();
        let newest = album.select(&[&year.max()]).scalar(&year);
        let select = album.select(&[&id]).where_clause(year.eq(&newest));
        assert_eq!(
            select.to_sql(),
            r#"SELECT "Album"."_id" FROM "Album" WHERE "Album"."Year" = (SELECT MAX("Album"."Year") FROM "Album")"#
        );
    }
}
