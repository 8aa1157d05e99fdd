//! Operators available on every typed expression.

use crate::builder::Select;
use crate::types::{LongType, Nullable, RealType, TextType, TypeRef, ValueType};

use super::{
    bool_type, AggregateFn, AsExpr, BinaryOp, Expr, ExprAlias, IntoOperand, NodeKind, Predicate,
};

fn binary<T: ValueType, U: ValueType>(
    left: &Expr<T>,
    op: BinaryOp,
    right: &Expr<T>,
    ty: TypeRef<U>,
) -> Expr<U> {
    Expr::from_kind(
        NodeKind::Binary {
            op,
            left: left.node().clone(),
            right: right.node().clone(),
        },
        ty,
    )
}

fn compare<T: ValueType>(left: &Expr<T>, op: BinaryOp, rhs: impl IntoOperand<T>) -> Predicate {
    let right = rhs.into_operand(left.type_ref());
    binary(left, op, &right, bool_type())
}

fn arithmetic<T: ValueType>(left: &Expr<T>, op: BinaryOp, rhs: impl IntoOperand<T>) -> Expr<T> {
    let right = rhs.into_operand(left.type_ref());
    binary(left, op, &right, left.type_ref().clone())
}

fn function<T: ValueType, U: ValueType>(
    name: &'static str,
    args: &[&Expr<T>],
    ty: TypeRef<U>,
) -> Expr<U> {
    Expr::from_kind(
        NodeKind::Function {
            name,
            args: args.iter().map(|arg| arg.node().clone()).collect(),
        },
        ty,
    )
}

fn aggregate<T: ValueType, U: ValueType>(
    func: AggregateFn,
    arg: &Expr<T>,
    ty: TypeRef<U>,
) -> Expr<U> {
    Expr::from_kind(
        NodeKind::Aggregate {
            func,
            arg: arg.node().clone(),
        },
        ty,
    )
}

fn in_list<T: ValueType, I>(operand: &Expr<T>, values: I, negated: bool) -> Predicate
where
    I: IntoIterator,
    I::Item: IntoOperand<T>,
{
    let items = values
        .into_iter()
        .map(|value| value.into_operand(operand.type_ref()).node().clone())
        .collect();
    Expr::from_kind(
        NodeKind::InList {
            operand: operand.node().clone(),
            items,
            negated,
        },
        bool_type(),
    )
}

fn in_query<T: ValueType>(operand: &Expr<T>, query: &Select, negated: bool) -> Predicate {
    Expr::from_kind(
        NodeKind::InQuery {
            operand: operand.node().clone(),
            query: query.core().clone(),
            negated,
        },
        bool_type(),
    )
}

/// Operators on typed expressions.
///
/// Comparisons yield a [`Predicate`]; arithmetic keeps the operand type;
/// aggregates follow SQLite's result types.
pub trait ExprExt<T: ValueType>: AsExpr<T> {
    /// `self = rhs`.
    fn eq(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::Eq, rhs)
    }

    /// `self != rhs`.
    fn ne(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::NotEq, rhs)
    }

    /// `self < rhs`.
    fn lt(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::Lt, rhs)
    }

    /// `self <= rhs`.
    fn le(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::LtEq, rhs)
    }

    /// `self > rhs`.
    fn gt(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::Gt, rhs)
    }

    /// `self >= rhs`.
    fn ge(&self, rhs: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::GtEq, rhs)
    }

    /// `self LIKE pattern`.
    fn like(&self, pattern: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::Like, pattern)
    }

    /// `self GLOB pattern`.
    fn glob(&self, pattern: impl IntoOperand<T>) -> Predicate {
        compare(self.as_expr(), BinaryOp::Glob, pattern)
    }

    /// `self IS NULL`.
    fn is_null(&self) -> Predicate {
        Expr::from_kind(
            NodeKind::IsNull {
                operand: self.as_expr().node().clone(),
                negated: false,
            },
            bool_type(),
        )
    }

    /// `self IS NOT NULL`.
    fn is_not_null(&self) -> Predicate {
        Expr::from_kind(
            NodeKind::IsNull {
                operand: self.as_expr().node().clone(),
                negated: true,
            },
            bool_type(),
        )
    }

    /// `self BETWEEN low AND high`.
    fn between(&self, low: impl IntoOperand<T>, high: impl IntoOperand<T>) -> Predicate {
        let operand = self.as_expr();
        let low = low.into_operand(operand.type_ref());
        let high = high.into_operand(operand.type_ref());
        Expr::from_kind(
            NodeKind::Between {
                operand: operand.node().clone(),
                low: low.node().clone(),
                high: high.node().clone(),
            },
            bool_type(),
        )
    }

    /// `self IN (v1, v2, ...)`.
    fn in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoOperand<T>,
    {
        in_list(self.as_expr(), values, false)
    }

    /// `self NOT IN (v1, v2, ...)`.
    fn not_in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoOperand<T>,
    {
        in_list(self.as_expr(), values, true)
    }

    /// `self IN (SELECT ...)`.
    fn in_query(&self, query: &Select) -> Predicate {
        in_query(self.as_expr(), query, false)
    }

    /// `self NOT IN (SELECT ...)`.
    fn not_in_query(&self, query: &Select) -> Predicate {
        in_query(self.as_expr(), query, true)
    }

    /// `self + rhs`.
    fn plus(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Add, rhs)
    }

    /// `self - rhs`.
    fn minus(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Sub, rhs)
    }

    /// `self * rhs`.
    fn times(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Mul, rhs)
    }

    /// `self / rhs`.
    fn div(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Div, rhs)
    }

    /// `self % rhs`.
    fn rem(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Rem, rhs)
    }

    /// `self || rhs`.
    fn concat(&self, rhs: impl IntoOperand<T>) -> Expr<T> {
        arithmetic(self.as_expr(), BinaryOp::Concat, rhs)
    }

    /// `LOWER(self)`.
    fn lower(&self) -> Expr<T> {
        let e = self.as_expr();
        function("LOWER", &[e], e.type_ref().clone())
    }

    /// `UPPER(self)`.
    fn upper(&self) -> Expr<T> {
        let e = self.as_expr();
        function("UPPER", &[e], e.type_ref().clone())
    }

    /// `LENGTH(self)`.
    fn length(&self) -> Expr<i64> {
        function("LENGTH", &[self.as_expr()], TypeRef::new(LongType))
    }

    /// `ABS(self)`.
    fn abs(&self) -> Expr<T> {
        let e = self.as_expr();
        function("ABS", &[e], e.type_ref().clone())
    }

    /// `COALESCE(self, fallback)`.
    fn coalesce(&self, fallback: impl IntoOperand<T>) -> Expr<T> {
        let e = self.as_expr();
        let fallback = fallback.into_operand(e.type_ref());
        function("COALESCE", &[e, &fallback], e.type_ref().clone())
    }

    /// `COUNT(self)`.
    fn count(&self) -> Expr<i64> {
        aggregate(AggregateFn::Count, self.as_expr(), TypeRef::new(LongType))
    }

    /// `COUNT(DISTINCT self)`.
    fn count_distinct(&self) -> Expr<i64> {
        Expr::from_kind(
            NodeKind::CountDistinct(self.as_expr().node().clone()),
            TypeRef::new(LongType),
        )
    }

    /// `MAX(self)`.
    fn max(&self) -> Expr<T> {
        let e = self.as_expr();
        aggregate(AggregateFn::Max, e, e.type_ref().clone())
    }

    /// `MIN(self)`.
    fn min(&self) -> Expr<T> {
        let e = self.as_expr();
        aggregate(AggregateFn::Min, e, e.type_ref().clone())
    }

    /// `SUM(self)`.
    fn sum(&self) -> Expr<T> {
        let e = self.as_expr();
        aggregate(AggregateFn::Sum, e, e.type_ref().clone())
    }

    /// `AVG(self)`, NULL over an empty group.
    fn avg(&self) -> Expr<Option<f64>> {
        aggregate(
            AggregateFn::Avg,
            self.as_expr(),
            TypeRef::new(Nullable::new(RealType)),
        )
    }

    /// `GROUP_CONCAT(self[, separator])`, NULL over an empty group.
    fn group_concat(&self, separator: Option<&str>) -> Expr<Option<String>> {
        Expr::from_kind(
            NodeKind::GroupConcat {
                arg: self.as_expr().node().clone(),
                separator: separator.map(str::to_owned),
            },
            TypeRef::new(Nullable::new(TextType)),
        )
    }

    /// Names this expression in a select list (`expr AS "name"`).
    fn alias(&self, name: &str) -> ExprAlias<T> {
        ExprAlias::new(name, self.as_expr().clone())
    }
}

impl<T: ValueType, E: AsExpr<T> + ?Sized> ExprExt<T> for E {}
