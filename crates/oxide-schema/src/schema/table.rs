//! Tables and the table builder.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::builder::{
    ColumnSet, Delete, Insert, NoAssignments, Select, SelectItem, Selectable, SqlBuilder,
    StatementSeed, Update,
};
use crate::error::ConstructionError;
use crate::expr::{Expr, Node, NodeKind, NodeRef, Predicate};
use crate::identity::Identity;
use crate::types::{EnumType, HasPersistentType, SqlEnum, TypeRef, ValueType};

use super::column::{render_check, AnyColumn, Column, ColumnBuilder, ColumnDef};
use super::constraint::{CheckConstraint, ForeignKeyConstraint};
use super::{Creatable, Index, MasterType};

// ============================================================================
// Table builder
// ============================================================================

#[derive(Debug)]
struct IndexSpec {
    name: Option<Identity>,
    columns: Vec<Identity>,
    unique: bool,
}

/// Declares the columns and table-level constraints of a table.
///
/// Every declaration call validates immediately and returns the first
/// problem it finds; [`build`](Self::build) checks the table as a whole.
#[derive(Debug)]
pub struct TableBuilder {
    name: Identity,
    columns: Vec<Arc<ColumnDef>>,
    column_primary_key: bool,
    composite_primary_key: Vec<Arc<ColumnDef>>,
    foreign_keys: Vec<ForeignKeyConstraint>,
    indices: Vec<IndexSpec>,
    checks: Vec<CheckConstraint>,
    without_rowid: bool,
}

impl TableBuilder {
    /// Starts a table named `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Identity::new(name),
            columns: Vec::new(),
            column_primary_key: false,
            composite_primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indices: Vec::new(),
            checks: Vec::new(),
            without_rowid: false,
        }
    }

    fn has_primary_key(&self) -> bool {
        self.column_primary_key || !self.composite_primary_key.is_empty()
    }

    fn duplicate_primary_key(&self) -> ConstructionError {
        ConstructionError::DuplicatePrimaryKey {
            table: self.name.raw().to_owned(),
        }
    }

    fn own_column(&self, column: &dyn AnyColumn) -> Result<Arc<ColumnDef>, ConstructionError> {
        let def = column.column_def();
        if def.table() == &self.name {
            Ok(Arc::clone(def))
        } else {
            Err(ConstructionError::ForeignColumn {
                table: self.name.raw().to_owned(),
                column: def.qualified_name(),
            })
        }
    }

    /// Declares a column with an explicit codec.
    ///
    /// `configure` declares the column's constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::DuplicateColumn`] for a repeated name,
    /// [`ConstructionError::DuplicatePrimaryKey`] for a second primary key,
    /// or the first misuse recorded by the [`ColumnBuilder`].
    pub fn column<T, F>(
        &mut self,
        name: &str,
        ty: TypeRef<T>,
        configure: F,
    ) -> Result<Column<T>, ConstructionError>
    where
        T: ValueType,
        F: FnOnce(ColumnBuilder<T>) -> ColumnBuilder<T>,
    {
        let name = Identity::new(name);
        if self.columns.iter().any(|c| c.name() == &name) {
            return Err(ConstructionError::DuplicateColumn {
                table: self.name.raw().to_owned(),
                column: name.raw().to_owned(),
            });
        }
        let (column, extras) = configure(ColumnBuilder::new(&self.name, &name, ty)).finish()?;
        let def = Arc::clone(column.def());
        if def.is_primary_key() {
            if self.has_primary_key() {
                return Err(self.duplicate_primary_key());
            }
            self.column_primary_key = true;
        }
        if let Some(reference) = extras.reference {
            let fk_name = reference.name.map_or_else(
                || {
                    ForeignKeyConstraint::default_name(
                        self.name.raw(),
                        name.raw(),
                        reference.column.name().raw(),
                    )
                },
                Identity::new,
            );
            self.foreign_keys.push(ForeignKeyConstraint::new(
                fk_name,
                Arc::clone(&def),
                reference.column,
                reference.on_delete,
                reference.on_update,
            ));
        }
        if let Some(unique) = extras.index {
            self.indices.push(IndexSpec {
                name: None,
                columns: vec![name],
                unique,
            });
        }
        self.checks.extend(extras.checks);
        self.columns.push(def);
        Ok(column)
    }

    /// Declares a column using the default codec of `T`.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn typed<T, F>(&mut self, name: &str, configure: F) -> Result<Column<T>, ConstructionError>
    where
        T: HasPersistentType,
        F: FnOnce(ColumnBuilder<T>) -> ColumnBuilder<T>,
    {
        self.column(name, T::persistent_type(), configure)
    }

    /// Declares an `i64` INTEGER column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn long<F>(&mut self, name: &str, configure: F) -> Result<Column<i64>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<i64>) -> ColumnBuilder<i64>,
    {
        self.typed(name, configure)
    }

    /// Declares an `i32` INTEGER column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn integer<F>(&mut self, name: &str, configure: F) -> Result<Column<i32>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<i32>) -> ColumnBuilder<i32>,
    {
        self.typed(name, configure)
    }

    /// Declares an `f64` REAL column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn real<F>(&mut self, name: &str, configure: F) -> Result<Column<f64>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<f64>) -> ColumnBuilder<f64>,
    {
        self.typed(name, configure)
    }

    /// Declares a `String` TEXT column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn text<F>(&mut self, name: &str, configure: F) -> Result<Column<String>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<String>) -> ColumnBuilder<String>,
    {
        self.typed(name, configure)
    }

    /// Declares a `Vec<u8>` BLOB column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn blob<F>(&mut self, name: &str, configure: F) -> Result<Column<Vec<u8>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<Vec<u8>>) -> ColumnBuilder<Vec<u8>>,
    {
        self.typed(name, configure)
    }

    /// Declares a `bool` column stored as INTEGER 0/1.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn boolean<F>(&mut self, name: &str, configure: F) -> Result<Column<bool>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<bool>) -> ColumnBuilder<bool>,
    {
        self.typed(name, configure)
    }

    /// Declares a `DateTime<Utc>` column stored as RFC 3339 TEXT.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn timestamp<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<Column<DateTime<Utc>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<DateTime<Utc>>) -> ColumnBuilder<DateTime<Utc>>,
    {
        self.typed(name, configure)
    }

    /// Declares a `NaiveDate` column stored as `YYYY-MM-DD` TEXT.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn date<F>(&mut self, name: &str, configure: F) -> Result<Column<NaiveDate>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<NaiveDate>) -> ColumnBuilder<NaiveDate>,
    {
        self.typed(name, configure)
    }

    /// Declares a nullable `i64` column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn opt_long<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<Column<Option<i64>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<Option<i64>>) -> ColumnBuilder<Option<i64>>,
    {
        self.typed(name, configure)
    }

    /// Declares a nullable `f64` column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn opt_real<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<Column<Option<f64>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<Option<f64>>) -> ColumnBuilder<Option<f64>>,
    {
        self.typed(name, configure)
    }

    /// Declares a nullable `String` column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn opt_text<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<Column<Option<String>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<Option<String>>) -> ColumnBuilder<Option<String>>,
    {
        self.typed(name, configure)
    }

    /// Declares a nullable `Vec<u8>` column.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn opt_blob<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<Column<Option<Vec<u8>>>, ConstructionError>
    where
        F: FnOnce(ColumnBuilder<Option<Vec<u8>>>) -> ColumnBuilder<Option<Vec<u8>>>,
    {
        self.typed(name, configure)
    }

    /// Declares an enum column stored as its TEXT name.
    ///
    /// # Errors
    ///
    /// Same as [`column`](Self::column).
    pub fn enumeration<E, F>(&mut self, name: &str, configure: F) -> Result<Column<E>, ConstructionError>
    where
        E: SqlEnum,
        F: FnOnce(ColumnBuilder<E>) -> ColumnBuilder<E>,
    {
        self.column(name, TypeRef::new(EnumType::<E>::new()), configure)
    }

    /// Declares a composite primary key
    /// (`CONSTRAINT "pk_<table>" PRIMARY KEY (...)`).
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::DuplicatePrimaryKey`] when a primary
    /// key was already declared, [`ConstructionError::ForeignColumn`] for a
    /// column of another table, and
    /// [`ConstructionError::AlreadyInPrimaryKey`] for a repeated column.
    pub fn primary_key(&mut self, columns: &[&dyn AnyColumn]) -> Result<(), ConstructionError> {
        if self.has_primary_key() {
            return Err(self.duplicate_primary_key());
        }
        let mut key: Vec<Arc<ColumnDef>> = Vec::with_capacity(columns.len());
        for column in columns {
            let def = self.own_column(*column)?;
            if key.iter().any(|k| k.name() == def.name()) {
                return Err(ConstructionError::AlreadyInPrimaryKey {
                    table: self.name.raw().to_owned(),
                    column: def.name().raw().to_owned(),
                });
            }
            key.push(def);
        }
        if key.is_empty() {
            return Err(ConstructionError::InvalidConstraint {
                column: self.name.raw().to_owned(),
                reason: String::from("a primary key needs at least one column"),
            });
        }
        self.composite_primary_key = key;
        Ok(())
    }

    fn add_index(
        &mut self,
        name: Option<&str>,
        columns: &[&dyn AnyColumn],
        unique: bool,
    ) -> Result<(), ConstructionError> {
        let columns = columns
            .iter()
            .map(|column| self.own_column(*column).map(|def| def.name().clone()))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            let index = name.map_or_else(|| format!("{}_", self.name.raw()), str::to_owned);
            return Err(ConstructionError::EmptyIndex { index });
        }
        self.indices.push(IndexSpec {
            name: name.map(Identity::new),
            columns,
            unique,
        });
        Ok(())
    }

    /// Declares an index named after the table and columns.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ForeignColumn`] or
    /// [`ConstructionError::EmptyIndex`].
    pub fn index(&mut self, columns: &[&dyn AnyColumn]) -> Result<(), ConstructionError> {
        self.add_index(None, columns, false)
    }

    /// Declares a unique index named after the table and columns.
    ///
    /// # Errors
    ///
    /// Same as [`index`](Self::index).
    pub fn unique_index(&mut self, columns: &[&dyn AnyColumn]) -> Result<(), ConstructionError> {
        self.add_index(None, columns, true)
    }

    /// Declares an index with an explicit name.
    ///
    /// # Errors
    ///
    /// Same as [`index`](Self::index).
    pub fn named_index(
        &mut self,
        name: &str,
        columns: &[&dyn AnyColumn],
        unique: bool,
    ) -> Result<(), ConstructionError> {
        self.add_index(Some(name), columns, unique)
    }

    /// Declares a named table-level CHECK constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnexpectedBindArgument`] when the
    /// predicate contains bind placeholders.
    pub fn check(&mut self, name: &str, predicate: &Predicate) -> Result<(), ConstructionError> {
        self.checks.push(render_check(name, predicate)?);
        Ok(())
    }

    /// Declares the table `WITHOUT ROWID`. Requires a primary key.
    pub fn without_rowid(&mut self) -> &mut Self {
        self.without_rowid = true;
        self
    }

    /// Finishes the table.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::EmptyTable`] when no column was
    /// declared, or [`ConstructionError::InvalidConstraint`] for a
    /// `WITHOUT ROWID` table without primary key.
    pub fn build(self) -> Result<Table, ConstructionError> {
        if self.columns.is_empty() {
            return Err(ConstructionError::EmptyTable {
                table: self.name.raw().to_owned(),
            });
        }
        if self.without_rowid && !self.has_primary_key() {
            return Err(ConstructionError::InvalidConstraint {
                column: self.name.raw().to_owned(),
                reason: String::from("WITHOUT ROWID requires a PRIMARY KEY"),
            });
        }
        let primary_key = if self.column_primary_key {
            self.columns
                .iter()
                .filter(|c| c.is_primary_key())
                .cloned()
                .collect()
        } else {
            self.composite_primary_key.clone()
        };
        let indices = self
            .indices
            .into_iter()
            .map(|spec| {
                let name = spec
                    .name
                    .unwrap_or_else(|| Index::default_name(&self.name, &spec.columns, spec.unique));
                Index::new(name, self.name.clone(), spec.columns, spec.unique)
            })
            .collect();
        let column_nodes = self.columns.iter().map(|c| Arc::clone(c.node())).collect();
        Ok(Table {
            inner: Arc::new(TableInner {
                identity: self.name,
                columns: self.columns,
                column_nodes,
                primary_key,
                composite_primary_key: !self.column_primary_key,
                foreign_keys: self.foreign_keys,
                indices,
                checks: self.checks,
                without_rowid: self.without_rowid,
            }),
        })
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug)]
struct TableInner {
    identity: Identity,
    columns: Vec<Arc<ColumnDef>>,
    column_nodes: Vec<NodeRef>,
    primary_key: Vec<Arc<ColumnDef>>,
    composite_primary_key: bool,
    foreign_keys: Vec<ForeignKeyConstraint>,
    indices: Vec<Index>,
    checks: Vec<CheckConstraint>,
    without_rowid: bool,
}

/// An immutable table definition, cheap to clone and share across threads.
#[derive(Debug, Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

impl Table {
    /// Starts declaring a table.
    #[must_use]
    pub fn builder(name: &str) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// The table name.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// The raw table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.identity.raw()
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Arc<ColumnDef>] {
        &self.inner.columns
    }

    /// Looks a column up by raw name.
    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<&Arc<ColumnDef>> {
        self.inner.columns.iter().find(|c| c.name().raw() == name)
    }

    /// Indices declared on the table.
    #[must_use]
    pub fn indices(&self) -> &[Index] {
        &self.inner.indices
    }

    /// Foreign keys declared by the table's columns.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKeyConstraint] {
        &self.inner.foreign_keys
    }

    /// CHECK constraints.
    #[must_use]
    pub fn checks(&self) -> &[CheckConstraint] {
        &self.inner.checks
    }

    /// Primary key columns in key order.
    #[must_use]
    pub fn primary_key_columns(&self) -> &[Arc<ColumnDef>] {
        &self.inner.primary_key
    }

    /// One-based position of `column` in the primary key.
    #[must_use]
    pub fn index_in_pk(&self, column: &dyn AnyColumn) -> Option<usize> {
        let def = column.column_def();
        self.inner
            .primary_key
            .iter()
            .position(|k| **k == **def)
            .map(|i| i + 1)
    }

    /// Whether the table is `WITHOUT ROWID`.
    #[must_use]
    pub fn is_without_rowid(&self) -> bool {
        self.inner.without_rowid
    }

    /// Tables referenced by this table's foreign keys, excluding itself.
    #[must_use]
    pub fn depends_on(&self) -> BTreeSet<Identity> {
        self.inner
            .foreign_keys
            .iter()
            .map(|fk| fk.referenced_table().clone())
            .filter(|t| t != self.identity())
            .collect()
    }

    fn append_body(&self, sql: &mut String) {
        sql.push_str(self.inner.identity.quoted());
        sql.push_str(" (");
        let mut parts: Vec<String> = self.inner.columns.iter().map(|c| c.ddl()).collect();
        if self.inner.composite_primary_key && !self.inner.primary_key.is_empty() {
            let columns: Vec<&str> = self
                .inner
                .primary_key
                .iter()
                .map(|c| c.name().quoted())
                .collect();
            let name = Identity::new(format!("pk_{}", self.name()));
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                name.quoted(),
                columns.join(", ")
            ));
        }
        for fk in &self.inner.foreign_keys {
            let mut part = String::new();
            fk.append_to(&mut part);
            parts.push(part);
        }
        for check in &self.inner.checks {
            let mut part = String::new();
            check.append_to(&mut part);
            parts.push(part);
        }
        sql.push_str(&parts.join(", "));
        sql.push(')');
        if self.inner.without_rowid {
            sql.push_str(" WITHOUT ROWID");
        }
    }

    /// The CREATE TABLE statement.
    #[must_use]
    pub fn ddl(&self, temporary: bool) -> String {
        let mut sql = String::from(if temporary {
            "CREATE TEMP TABLE IF NOT EXISTS "
        } else {
            "CREATE TABLE IF NOT EXISTS "
        });
        self.append_body(&mut sql);
        sql
    }

    /// The statement text SQLite keeps in `sqlite_master` for this table.
    #[must_use]
    pub fn schema_sql(&self) -> String {
        let mut sql = String::from("CREATE TABLE ");
        self.append_body(&mut sql);
        sql
    }

    /// Selects `items`, or every column when `items` is empty.
    #[must_use]
    pub fn select(&self, items: &[&dyn Selectable]) -> Select {
        Select::new(self, items)
    }

    /// Selects every column.
    #[must_use]
    pub fn select_all(&self) -> Select {
        Select::all(self)
    }

    /// Starts an INSERT.
    #[must_use]
    pub fn insert(&self) -> Insert {
        Insert::new(self)
    }

    /// Starts an UPDATE.
    #[must_use]
    pub fn update(&self) -> Update<NoAssignments> {
        Update::new(self)
    }

    /// Starts a DELETE.
    #[must_use]
    pub fn delete(&self) -> Delete {
        Delete::new(self)
    }

    /// `DELETE FROM "T"`.
    #[must_use]
    pub fn delete_all(&self) -> StatementSeed {
        Delete::new(self).build()
    }

    /// `DELETE FROM "T" WHERE ...`.
    #[must_use]
    pub fn delete_where(&self, predicate: Predicate) -> StatementSeed {
        Delete::new(self).where_clause(predicate).build()
    }

    /// Refers to the table under another name, for self joins.
    #[must_use]
    pub fn alias(&self, name: &str) -> TableAlias {
        TableAlias::new(self, Identity::new(name))
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.inner.identity == other.inner.identity
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.identity.hash(state);
    }
}

impl ColumnSet for Table {
    fn append_from(&self, b: &mut SqlBuilder) {
        b.push_identity(&self.inner.identity);
    }

    fn select_items(&self) -> Vec<SelectItem> {
        self.inner
            .column_nodes
            .iter()
            .map(|node| SelectItem::plain(Arc::clone(node)))
            .collect()
    }

    fn as_table(&self) -> Option<&Table> {
        Some(self)
    }
}

impl Creatable for Table {
    fn master_type(&self) -> MasterType {
        MasterType::Table
    }

    fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    fn create_statements(&self, temporary: bool) -> Vec<StatementSeed> {
        let mut statements = vec![StatementSeed::raw(self.ddl(temporary))];
        statements.extend(self.inner.indices.iter().map(|index| StatementSeed::raw(index.ddl())));
        statements
    }

    fn drop_statements(&self) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(format!(
            "DROP TABLE IF EXISTS {}",
            self.inner.identity.quoted()
        ))]
    }
}

// ============================================================================
// Table alias
// ============================================================================

/// A table under another name (`"Person" AS "p"`).
///
/// Columns are reached through [`get`](Self::get), which renders them
/// qualified by the alias. Lookups of the same column share one expression
/// id.
#[derive(Debug, Clone)]
pub struct TableAlias {
    table: Table,
    alias: Identity,
    nodes: Arc<Vec<NodeRef>>,
}

impl TableAlias {
    fn new(table: &Table, alias: Identity) -> Self {
        let nodes = table
            .columns()
            .iter()
            .map(|column| {
                Node::new(
                    NodeKind::Column {
                        table: alias.clone(),
                        column: column.name().clone(),
                    },
                    Arc::clone(column.codec()),
                )
            })
            .collect();
        Self {
            table: table.clone(),
            alias,
            nodes: Arc::new(nodes),
        }
    }

    /// The alias name.
    #[must_use]
    pub const fn alias(&self) -> &Identity {
        &self.alias
    }

    /// The aliased table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// `column` qualified by the alias.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ForeignColumn`] when `column` does not
    /// belong to the aliased table.
    pub fn get<T: ValueType>(&self, column: &Column<T>) -> Result<Expr<T>, ConstructionError> {
        self.table
            .columns()
            .iter()
            .position(|c| **c == **column.def())
            .map(|i| Expr::from_node(Arc::clone(&self.nodes[i]), column.type_ref().clone()))
            .ok_or_else(|| ConstructionError::ForeignColumn {
                table: self.table.name().to_owned(),
                column: column.def().qualified_name(),
            })
    }
}

impl ColumnSet for TableAlias {
    fn append_from(&self, b: &mut SqlBuilder) {
        b.push_identity(self.table.identity())
            .push(" AS ")
            .push_identity(&self.alias);
    }

    fn select_items(&self) -> Vec<SelectItem> {
        self.nodes
            .iter()
            .map(|node| SelectItem::plain(Arc::clone(node)))
            .collect()
    }
}
