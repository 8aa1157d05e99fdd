//! Typed SQL expressions.
//!
//! An [`Expr<T>`] is an immutable node of an expression tree whose SQL
//! value decodes to `T`. Expressions are cheap to clone: clones share the
//! node and its [`ExprId`], which is how result columns are looked up by
//! the expression that produced them.
//!
//! Comparison, arithmetic and aggregate operators come from [`ExprExt`],
//! implemented for every [`AsExpr`] (columns, aliases, view columns and
//! expressions themselves). Right-hand operands are anything implementing
//! [`IntoOperand`]: another expression, a plain Rust value (rendered as a
//! literal), [`literal`] or the [`bind`] placeholder.

mod alias;
mod node;
mod ops;

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::builder::{Select, SqlBuilder};
use crate::types::{BoolType, LongType, PersistentType, TypeRef, ValueType};

pub use alias::{ExprAlias, QueryAlias};
pub use node::ExprId;
pub use ops::ExprExt;

pub(crate) use node::{AggregateFn, BinaryOp, Node, NodeKind, NodeRef};

/// A typed SQL expression.
pub struct Expr<T> {
    node: NodeRef,
    ty: TypeRef<T>,
}

/// A boolean expression, usable in WHERE, HAVING, ON and WHEN clauses.
pub type Predicate = Expr<bool>;

impl<T> Expr<T> {
    /// The stable id of this expression.
    #[must_use]
    pub fn id(&self) -> ExprId {
        self.node.id()
    }

    /// The codec of the expression's value.
    #[must_use]
    pub const fn type_ref(&self) -> &TypeRef<T> {
        &self.ty
    }

    pub(crate) const fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Renders the expression on its own.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut b = SqlBuilder::new();
        b.push_node(&self.node);
        b.sql().to_owned()
    }
}

impl<T: ValueType> Expr<T> {
    pub(crate) fn from_kind(kind: NodeKind, ty: TypeRef<T>) -> Self {
        Self {
            node: Node::new(kind, ty.erased().clone()),
            ty,
        }
    }

    pub(crate) const fn from_node(node: NodeRef, ty: TypeRef<T>) -> Self {
        Self { node, ty }
    }

    /// A literal value rendered with the codec's literal form.
    #[must_use]
    pub fn value(value: &T, ty: &TypeRef<T>) -> Self {
        Self::from_kind(NodeKind::Literal(ty.literal(value)), ty.clone())
    }

    /// A bind placeholder whose argument is encoded by `ty`.
    #[must_use]
    pub fn placeholder(ty: &TypeRef<T>) -> Self {
        Self::from_kind(NodeKind::Bind, ty.clone())
    }

    /// The same expression, decoded as nullable.
    ///
    /// The result keeps this expression's id, so it reads the same result
    /// column. Useful for columns on the optional side of a LEFT JOIN.
    #[must_use]
    pub fn as_nullable(&self) -> Expr<Option<T>> {
        Expr::from_node(self.node.clone(), self.ty.to_nullable())
    }
}

impl Expr<bool> {
    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        connect(BinaryOp::And, &self, &other)
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        connect(BinaryOp::Or, &self, &other)
    }

    /// `NOT self`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::from_kind(NodeKind::Not(self.node), bool_type())
    }
}

fn connect(op: BinaryOp, left: &Predicate, right: &Predicate) -> Predicate {
    Expr::from_kind(
        NodeKind::Binary {
            op,
            left: left.node.clone(),
            right: right.node.clone(),
        },
        bool_type(),
    )
}

pub(crate) fn bool_type() -> TypeRef<bool> {
    TypeRef::new(BoolType)
}

/// Joins two optional predicates with AND.
pub(crate) fn and_nodes(current: Option<NodeRef>, next: NodeRef) -> NodeRef {
    match current {
        None => next,
        Some(left) => Node::new(
            NodeKind::Binary {
                op: BinaryOp::And,
                left,
                right: next,
            },
            bool_type().erased().clone(),
        ),
    }
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            ty: self.ty.clone(),
        }
    }
}

impl<T> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = SqlBuilder::new();
        b.push_node(&self.node);
        f.debug_struct("Expr")
            .field("id", &self.node.id())
            .field("sql", &b.sql())
            .finish()
    }
}

/// Anything that stands for a typed expression.
pub trait AsExpr<T> {
    /// The underlying expression.
    fn as_expr(&self) -> &Expr<T>;
}

impl<T> AsExpr<T> for Expr<T> {
    fn as_expr(&self) -> &Self {
        self
    }
}

/// A right-hand operand of a typed operator.
///
/// Plain values become literals encoded by the left-hand side's codec.
pub trait IntoOperand<T> {
    /// Converts into an expression, using `ty` for values.
    fn into_operand(self, ty: &TypeRef<T>) -> Expr<T>;
}

impl<T: ValueType> IntoOperand<T> for Expr<T> {
    fn into_operand(self, _ty: &TypeRef<T>) -> Self {
        self
    }
}

impl<T: ValueType> IntoOperand<T> for &Expr<T> {
    fn into_operand(self, _ty: &TypeRef<T>) -> Expr<T> {
        self.clone()
    }
}

/// An explicit literal operand, see [`literal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal<T>(pub T);

/// Wraps a value to be rendered as a literal.
///
/// Plain values already render as literals; this is for types without a
/// direct [`IntoOperand`] impl, such as enums.
pub const fn literal<T>(value: T) -> Literal<T> {
    Literal(value)
}

impl<T: ValueType> IntoOperand<T> for Literal<T> {
    fn into_operand(self, ty: &TypeRef<T>) -> Expr<T> {
        Expr::value(&self.0, ty)
    }
}

/// The `?` bind placeholder operand, see [`bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placeholder;

/// A bind placeholder. Its argument is supplied when the statement runs
/// and is encoded with the codec of the other operand.
#[must_use]
pub const fn bind() -> Placeholder {
    Placeholder
}

impl<T: ValueType> IntoOperand<T> for Placeholder {
    fn into_operand(self, ty: &TypeRef<T>) -> Expr<T> {
        Expr::placeholder(ty)
    }
}

macro_rules! value_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand<$ty> for $ty {
                fn into_operand(self, ty: &TypeRef<$ty>) -> Expr<$ty> {
                    Expr::value(&self, ty)
                }
            }

            impl IntoOperand<Option<$ty>> for $ty {
                fn into_operand(self, ty: &TypeRef<Option<$ty>>) -> Expr<Option<$ty>> {
                    Expr::value(&Some(self), ty)
                }
            }

            impl IntoOperand<Option<$ty>> for Option<$ty> {
                fn into_operand(self, ty: &TypeRef<Option<$ty>>) -> Expr<Option<$ty>> {
                    Expr::value(&self, ty)
                }
            }
        )*
    };
}

value_operand!(i64, i32, f64, bool, String, Vec<u8>, DateTime<Utc>, NaiveDate);

impl IntoOperand<String> for &str {
    fn into_operand(self, ty: &TypeRef<String>) -> Expr<String> {
        Expr::value(&self.to_owned(), ty)
    }
}

impl IntoOperand<Option<String>> for &str {
    fn into_operand(self, ty: &TypeRef<Option<String>>) -> Expr<Option<String>> {
        Expr::value(&Some(self.to_owned()), ty)
    }
}

/// `COUNT(*)`.
#[must_use]
pub fn count_star() -> Expr<i64> {
    Expr::from_kind(NodeKind::CountStar, TypeRef::new(LongType))
}

/// `EXISTS (subquery)`.
#[must_use]
pub fn exists(query: &Select) -> Predicate {
    Expr::from_kind(
        NodeKind::Exists {
            query: query.core().clone(),
            negated: false,
        },
        bool_type(),
    )
}

/// `NOT EXISTS (subquery)`.
#[must_use]
pub fn not_exists(query: &Select) -> Predicate {
    Expr::from_kind(
        NodeKind::Exists {
            query: query.core().clone(),
            negated: true,
        },
        bool_type(),
    )
}
