//! Typed columns and the column builder.

use std::fmt;
use std::sync::Arc;

use crate::builder::{SelectItem, Selectable, SqlBuilder};
use crate::error::ConstructionError;
use crate::expr::{AsExpr, Expr, IntoOperand, NodeKind, NodeRef, Predicate};
use crate::identity::Identity;
use crate::types::{AnyType, PersistentType, SqlType, StorageClass, TypeRef, ValueType};

use super::constraint::{CheckConstraint, Collate, ColumnConstraint, ForeignKeyAction, OnConflict};

// ============================================================================
// Column definition
// ============================================================================

/// The untyped definition of a column, shared by the typed handle, the
/// owning table and foreign keys.
#[derive(Debug)]
pub struct ColumnDef {
    table: Identity,
    name: Identity,
    ty: Arc<dyn AnyType>,
    constraints: Vec<ColumnConstraint>,
    default: Option<String>,
    nullable: bool,
    node: NodeRef,
}

impl ColumnDef {
    /// The owning table.
    #[must_use]
    pub const fn table(&self) -> &Identity {
        &self.table
    }

    /// The column name.
    #[must_use]
    pub const fn name(&self) -> &Identity {
        &self.name
    }

    /// `Table.column`, unquoted.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table.raw(), self.name.raw())
    }

    /// The column's codec.
    #[must_use]
    pub const fn codec(&self) -> &Arc<dyn AnyType> {
        &self.ty
    }

    /// The declared storage class.
    #[must_use]
    pub fn storage_class(&self) -> StorageClass {
        self.ty.info().storage_class()
    }

    /// Whether the column can hold NULL. An INTEGER primary key that is not
    /// declared DESC aliases the ROWID and is assigned when NULL is inserted.
    #[must_use]
    pub const fn nullable(&self) -> bool {
        self.nullable
    }

    /// Whether the column carries a column-level PRIMARY KEY.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::PrimaryKey { .. }))
    }

    /// Whether the column carries a UNIQUE constraint.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::Unique { .. }))
    }

    /// The declared collation, if any.
    #[must_use]
    pub fn collate(&self) -> Option<&Collate> {
        self.constraints.iter().find_map(|c| match c {
            ColumnConstraint::Collate(collate) => Some(collate),
            _ => None,
        })
    }

    /// The rendered DEFAULT expression, if any.
    #[must_use]
    pub fn default_sql(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub(crate) const fn node(&self) -> &NodeRef {
        &self.node
    }

    /// The column definition as written inside CREATE TABLE.
    #[must_use]
    pub fn ddl(&self) -> String {
        let mut sql = String::new();
        sql.push_str(self.name.quoted());
        sql.push(' ');
        sql.push_str(self.storage_class().as_sql());
        if !self.ty.info().nullable() {
            sql.push_str(" NOT NULL");
        }
        for constraint in &self.constraints {
            constraint.append_to(&mut sql);
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

impl PartialEq for ColumnDef {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
            && self.name == other.name
            && self.ty.codec_id() == other.ty.codec_id()
    }
}

impl Eq for ColumnDef {}

/// Type-erased access to a column, for APIs taking columns of mixed types.
pub trait AnyColumn {
    /// The column definition.
    fn column_def(&self) -> &Arc<ColumnDef>;
}

// ============================================================================
// Typed column
// ============================================================================

/// A column of a table whose values decode to `T`.
///
/// A column is itself an expression (`"Table"."column"`), usable anywhere
/// an [`AsExpr<T>`] is accepted.
pub struct Column<T> {
    def: Arc<ColumnDef>,
    expr: Expr<T>,
}

impl<T: ValueType> Column<T> {
    /// The column name.
    #[must_use]
    pub fn name(&self) -> &Identity {
        self.def.name()
    }

    /// The owning table's name.
    #[must_use]
    pub fn table_name(&self) -> &Identity {
        self.def.table()
    }

    /// The column's codec.
    #[must_use]
    pub const fn type_ref(&self) -> &TypeRef<T> {
        self.expr.type_ref()
    }

    /// See [`ColumnDef::nullable`].
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.def.nullable()
    }

    /// The untyped definition.
    #[must_use]
    pub const fn def(&self) -> &Arc<ColumnDef> {
        &self.def
    }

    /// Whether both handles denote the same column: same table, same name
    /// and same codec.
    #[must_use]
    pub fn same_column<U>(&self, other: &Column<U>) -> bool {
        *self.def == *other.def
    }

    /// This column decoded as nullable, for the optional side of a
    /// LEFT JOIN.
    #[must_use]
    pub fn as_nullable(&self) -> Expr<Option<T>> {
        self.expr.as_nullable()
    }

    /// See [`ColumnDef::ddl`].
    #[must_use]
    pub fn ddl(&self) -> String {
        self.def.ddl()
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            expr: self.expr.clone(),
        }
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("table", &self.def.table().raw())
            .field("name", &self.def.name().raw())
            .field("storage_class", &self.def.ty.info().storage_class())
            .finish()
    }
}

impl<T> AsExpr<T> for Column<T> {
    fn as_expr(&self) -> &Expr<T> {
        &self.expr
    }
}

impl<T> AnyColumn for Column<T> {
    fn column_def(&self) -> &Arc<ColumnDef> {
        &self.def
    }
}

impl<T> Selectable for Column<T> {
    fn select_item(&self) -> SelectItem {
        SelectItem::plain(Arc::clone(&self.def.node))
    }
}

impl<T: ValueType> IntoOperand<T> for &Column<T> {
    fn into_operand(self, _ty: &TypeRef<T>) -> Expr<T> {
        self.expr.clone()
    }
}

// ============================================================================
// Column builder
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct Reference {
    pub(crate) column: Arc<ColumnDef>,
    pub(crate) name: Option<String>,
    pub(crate) on_delete: ForeignKeyAction,
    pub(crate) on_update: ForeignKeyAction,
}

/// Everything a column contributes to its table besides its definition.
#[derive(Debug)]
pub(crate) struct ColumnExtras {
    pub(crate) reference: Option<Reference>,
    /// `Some(unique)` when the column gets its own index.
    pub(crate) index: Option<bool>,
    pub(crate) checks: Vec<CheckConstraint>,
}

/// Declares the constraints of one column.
///
/// Obtained inside [`TableBuilder::column`](super::TableBuilder::column)
/// and its typed helpers. Misuse is recorded and reported by that call.
pub struct ColumnBuilder<T> {
    expr: Expr<T>,
    table: Identity,
    name: Identity,
    constraints: Vec<ColumnConstraint>,
    default: Option<String>,
    reference: Option<Reference>,
    index: Option<bool>,
    checks: Vec<CheckConstraint>,
    error: Option<ConstructionError>,
}

impl<T: ValueType> ColumnBuilder<T> {
    pub(crate) fn new(table: &Identity, name: &Identity, ty: TypeRef<T>) -> Self {
        let expr = Expr::from_kind(
            NodeKind::Column {
                table: table.clone(),
                column: name.clone(),
            },
            ty,
        );
        Self {
            expr,
            table: table.clone(),
            name: name.clone(),
            constraints: Vec::new(),
            default: None,
            reference: None,
            index: None,
            checks: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) {
        let column = self.name.raw().to_owned();
        self.error.get_or_insert_with(|| ConstructionError::InvalidConstraint {
            column,
            reason: reason.into(),
        });
    }

    /// Applies `update` to the PRIMARY KEY constraint, declaring it first if
    /// needed. `update` receives the direction and the AUTOINCREMENT flag.
    fn update_primary_key(&mut self, update: impl FnOnce(&mut Option<bool>, &mut bool)) {
        let position = self
            .constraints
            .iter()
            .position(|c| matches!(c, ColumnConstraint::PrimaryKey { .. }));
        let index = position.unwrap_or_else(|| {
            self.constraints.push(ColumnConstraint::PrimaryKey {
                descending: None,
                on_conflict: OnConflict::Unspecified,
                auto_increment: false,
            });
            self.constraints.len() - 1
        });
        if let ColumnConstraint::PrimaryKey {
            descending,
            auto_increment,
            ..
        } = &mut self.constraints[index]
        {
            update(descending, auto_increment);
        }
    }

    /// `PRIMARY KEY`.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.update_primary_key(|_, _| {});
        self
    }

    /// `PRIMARY KEY ASC`.
    #[must_use]
    pub fn asc(mut self) -> Self {
        self.update_primary_key(|descending, _| *descending = Some(false));
        self
    }

    /// `PRIMARY KEY DESC`. A descending INTEGER key does not alias the ROWID.
    #[must_use]
    pub fn desc(mut self) -> Self {
        self.update_primary_key(|descending, _| *descending = Some(true));
        self
    }

    /// `PRIMARY KEY AUTOINCREMENT`. Requires an INTEGER codec.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        if !self.expr.type_ref().is_integer_type() {
            self.fail("AUTOINCREMENT requires an INTEGER column");
            return self;
        }
        self.update_primary_key(|_, auto_increment| *auto_increment = true);
        self
    }

    /// `UNIQUE`.
    #[must_use]
    pub fn unique(mut self) -> Self {
        if !self
            .constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::Unique { .. }))
        {
            self.constraints.push(ColumnConstraint::Unique {
                on_conflict: OnConflict::Unspecified,
            });
        }
        self
    }

    /// Conflict clause of the most recently declared PRIMARY KEY or UNIQUE.
    #[must_use]
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        let target = self.constraints.iter_mut().rev().find_map(|c| match c {
            ColumnConstraint::PrimaryKey {
                on_conflict: slot, ..
            }
            | ColumnConstraint::Unique { on_conflict: slot } => Some(slot),
            ColumnConstraint::Collate(_) => None,
        });
        match target {
            Some(slot) => *slot = on_conflict,
            None => self.fail("ON CONFLICT requires PRIMARY KEY or UNIQUE"),
        }
        self
    }

    /// `COLLATE <collation>`.
    #[must_use]
    pub fn collate(mut self, collate: Collate) -> Self {
        self.constraints
            .retain(|c| !matches!(c, ColumnConstraint::Collate(_)));
        self.constraints.push(ColumnConstraint::Collate(collate));
        self
    }

    /// `COLLATE NOCASE`.
    #[must_use]
    pub fn collate_no_case(self) -> Self {
        self.collate(Collate::NoCase)
    }

    /// `COLLATE BINARY`.
    #[must_use]
    pub fn collate_binary(self) -> Self {
        self.collate(Collate::Binary)
    }

    /// `COLLATE RTRIM`.
    #[must_use]
    pub fn collate_rtrim(self) -> Self {
        self.collate(Collate::RTrim)
    }

    /// `DEFAULT <value>`, rendered through the column's codec.
    #[must_use]
    pub fn default(mut self, value: impl Into<T>) -> Self {
        self.default = Some(self.expr.type_ref().literal(&value.into()));
        self
    }

    /// `DEFAULT <sql>` for expressions such as `CURRENT_TIMESTAMP`.
    #[must_use]
    pub fn default_raw(mut self, sql: &str) -> Self {
        let trimmed = sql.trim();
        let bare = trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '-');
        self.default = Some(if bare {
            trimmed.to_owned()
        } else {
            format!("({trimmed})")
        });
        self
    }

    /// `REFERENCES "Table"("column")`, declared as a table-level foreign key.
    #[must_use]
    pub fn references<R>(mut self, column: &Column<R>) -> Self {
        self.reference = Some(Reference {
            column: Arc::clone(&column.def),
            name: None,
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        self
    }

    fn reference_mut(&mut self, what: &str) -> Option<&mut Reference> {
        if self.reference.is_none() {
            self.fail(format!("{what} requires REFERENCES"));
        }
        self.reference.as_mut()
    }

    /// `ON DELETE <action>` of the foreign key.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let Some(reference) = self.reference_mut("ON DELETE") {
            reference.on_delete = action;
        }
        self
    }

    /// `ON UPDATE <action>` of the foreign key.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        if let Some(reference) = self.reference_mut("ON UPDATE") {
            reference.on_update = action;
        }
        self
    }

    /// Overrides the default foreign key name.
    #[must_use]
    pub fn fk_name(mut self, name: &str) -> Self {
        if let Some(reference) = self.reference_mut("a foreign key name") {
            reference.name = Some(name.to_owned());
        }
        self
    }

    /// Creates an index on this column.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = Some(self.index.unwrap_or(false));
        self
    }

    /// Creates a unique index on this column.
    #[must_use]
    pub fn unique_index(mut self) -> Self {
        self.index = Some(true);
        self
    }

    /// Adds a named CHECK constraint over this column.
    ///
    /// The predicate must not contain bind placeholders.
    #[must_use]
    pub fn check<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: FnOnce(&Expr<T>) -> Predicate,
    {
        match render_check(name, &predicate(&self.expr)) {
            Ok(check) => self.checks.push(check),
            Err(error) => {
                self.error.get_or_insert(error);
            }
        }
        self
    }

    pub(crate) fn finish(self) -> Result<(Column<T>, ColumnExtras), ConstructionError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let ty = self.expr.type_ref();
        let mut rowid_alias = false;
        for constraint in &self.constraints {
            if let ColumnConstraint::PrimaryKey {
                descending,
                auto_increment,
                ..
            } = constraint
            {
                if *auto_increment && *descending == Some(true) {
                    return Err(ConstructionError::InvalidConstraint {
                        column: self.name.raw().to_owned(),
                        reason: String::from("AUTOINCREMENT cannot be combined with DESC"),
                    });
                }
                rowid_alias = ty.is_integer_type() && *descending != Some(true);
            }
        }
        let def = Arc::new(ColumnDef {
            table: self.table,
            name: self.name,
            ty: ty.erased().clone(),
            constraints: self.constraints,
            default: self.default,
            nullable: ty.nullable() || rowid_alias,
            node: self.expr.node().clone(),
        });
        let column = Column {
            def,
            expr: self.expr,
        };
        let extras = ColumnExtras {
            reference: self.reference,
            index: self.index,
            checks: self.checks,
        };
        Ok((column, extras))
    }
}

impl<T> fmt::Debug for ColumnBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBuilder")
            .field("table", &self.table)
            .field("name", &self.name)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// Renders a CHECK predicate, rejecting bind placeholders.
pub(crate) fn render_check(name: &str, predicate: &Predicate) -> Result<CheckConstraint, ConstructionError> {
    let mut b = SqlBuilder::new();
    b.push_node(predicate.node());
    if b.arg_count() > 0 {
        return Err(ConstructionError::UnexpectedBindArgument {
            object: "check",
            name: name.to_owned(),
            sql: b.sql().to_owned(),
        });
    }
    Ok(CheckConstraint::new(Identity::new(name), b.sql().to_owned()))
}
