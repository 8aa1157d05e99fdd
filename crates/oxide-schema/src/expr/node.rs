//! Expression tree nodes and their SQL rendering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::builder::select::SelectCore;
use crate::builder::SqlBuilder;
use crate::identity::Identity;
use crate::schema::TriggerScope;
use crate::types::{quote_text, AnyType};

/// Stable identifier assigned to every expression node when it is built.
///
/// Clones of an expression share the id, so it can key result-column
/// lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type NodeRef = Arc<Node>;

/// Binds tighter than any operator.
const PRIMARY: u8 = 10;
/// `NOT` sits between the connectives and the comparisons.
const NOT: u8 = 3;
/// Equality, pattern matching and the postfix predicates (`IS NULL`,
/// `BETWEEN`, `IN`).
const EQUALITY: u8 = 4;
/// `<`, `<=`, `>` and `>=` bind tighter than equality.
const RELATIONAL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    Glob,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

impl BinaryOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::Glob => "GLOB",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Concat => "||",
        }
    }

    /// Higher binds tighter.
    const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Like | Self::Glob => EQUALITY,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => RELATIONAL,
            Self::Add | Self::Sub => 6,
            Self::Mul | Self::Div | Self::Rem => 7,
            Self::Concat => 8,
        }
    }

    const fn is_connective(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    const fn is_associative(self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Add | Self::Mul | Self::Concat
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggregateFn {
    Count,
    Max,
    Min,
    Sum,
    Avg,
}

impl AggregateFn {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    /// Pre-rendered literal text.
    Literal(String),
    Bind,
    Column {
        table: Identity,
        column: Identity,
    },
    Trigger {
        scope: TriggerScope,
        column: Identity,
    },
    /// Reference to an expression aliased in the same select list.
    AliasRef(Identity),
    Not(NodeRef),
    IsNull {
        operand: NodeRef,
        negated: bool,
    },
    Binary {
        op: BinaryOp,
        left: NodeRef,
        right: NodeRef,
    },
    Between {
        operand: NodeRef,
        low: NodeRef,
        high: NodeRef,
    },
    InList {
        operand: NodeRef,
        items: Vec<NodeRef>,
        negated: bool,
    },
    InQuery {
        operand: NodeRef,
        query: Arc<SelectCore>,
        negated: bool,
    },
    Exists {
        query: Arc<SelectCore>,
        negated: bool,
    },
    Function {
        name: &'static str,
        args: Vec<NodeRef>,
    },
    Aggregate {
        func: AggregateFn,
        arg: NodeRef,
    },
    CountStar,
    CountDistinct(NodeRef),
    GroupConcat {
        arg: NodeRef,
        separator: Option<String>,
    },
    Subquery(Arc<SelectCore>),
}

#[derive(Debug)]
pub(crate) struct Node {
    id: ExprId,
    kind: NodeKind,
    ty: Arc<dyn AnyType>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, ty: Arc<dyn AnyType>) -> NodeRef {
        Arc::new(Self {
            id: ExprId::next(),
            kind,
            ty,
        })
    }

    pub(crate) const fn id(&self) -> ExprId {
        self.id
    }

    pub(crate) const fn ty(&self) -> &Arc<dyn AnyType> {
        &self.ty
    }

    /// The column name a result column gets by default, if any.
    pub(crate) const fn column_name(&self) -> Option<&Identity> {
        match &self.kind {
            NodeKind::Column { column, .. } => Some(column),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            NodeKind::Binary { op, .. } => op.precedence(),
            NodeKind::Not(_) => NOT,
            NodeKind::IsNull { .. }
            | NodeKind::Between { .. }
            | NodeKind::InList { .. }
            | NodeKind::InQuery { .. } => EQUALITY,
            _ => PRIMARY,
        }
    }

    pub(crate) fn append_to(&self, b: &mut SqlBuilder) {
        match &self.kind {
            NodeKind::Literal(text) => {
                b.push(text);
            }
            NodeKind::Bind => {
                b.push_bind(&self.ty);
            }
            NodeKind::Column { table, column } => {
                b.push_identity(table).push(".").push_identity(column);
            }
            NodeKind::Trigger { scope, column } => {
                b.push(scope.as_sql()).push(".").push_identity(column);
            }
            NodeKind::AliasRef(name) => {
                b.push_identity(name);
            }
            NodeKind::Not(operand) => {
                b.push("NOT ");
                append_child(b, operand, NOT);
            }
            NodeKind::IsNull { operand, negated } => {
                append_child(b, operand, EQUALITY + 1);
                b.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            NodeKind::Binary { op, left, right } => {
                append_wrapped(b, left, needs_parens(*op, left, false));
                b.push(" ").push(op.as_str()).push(" ");
                append_wrapped(b, right, needs_parens(*op, right, true));
            }
            NodeKind::Between { operand, low, high } => {
                append_child(b, operand, EQUALITY + 1);
                b.push(" BETWEEN ");
                append_child(b, low, EQUALITY + 1);
                b.push(" AND ");
                append_child(b, high, EQUALITY + 1);
            }
            NodeKind::InList {
                operand,
                items,
                negated,
            } => {
                append_child(b, operand, EQUALITY + 1);
                b.push(if *negated { " NOT IN (" } else { " IN (" });
                append_list(b, items);
                b.push(")");
            }
            NodeKind::InQuery {
                operand,
                query,
                negated,
            } => {
                append_child(b, operand, EQUALITY + 1);
                b.push(if *negated { " NOT IN (" } else { " IN (" });
                query.append_to(b);
                b.push(")");
            }
            NodeKind::Exists { query, negated } => {
                b.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                query.append_to(b);
                b.push(")");
            }
            NodeKind::Function { name, args } => {
                b.push(name).push("(");
                append_list(b, args);
                b.push(")");
            }
            NodeKind::Aggregate { func, arg } => {
                b.push(func.as_str()).push("(");
                arg.append_to(b);
                b.push(")");
            }
            NodeKind::CountStar => {
                b.push("COUNT(*)");
            }
            NodeKind::CountDistinct(arg) => {
                b.push("COUNT(DISTINCT ");
                arg.append_to(b);
                b.push(")");
            }
            NodeKind::GroupConcat { arg, separator } => {
                b.push("GROUP_CONCAT(");
                arg.append_to(b);
                if let Some(separator) = separator {
                    b.push(", ").push(&quote_text(separator));
                }
                b.push(")");
            }
            NodeKind::Subquery(query) => {
                b.push("(");
                query.append_to(b);
                b.push(")");
            }
        }
    }
}

fn append_wrapped(b: &mut SqlBuilder, node: &Node, wrap: bool) {
    if wrap {
        b.push("(");
        node.append_to(b);
        b.push(")");
    } else {
        node.append_to(b);
    }
}

/// Appends `node`, parenthesized when it binds looser than `min_precedence`.
fn append_child(b: &mut SqlBuilder, node: &Node, min_precedence: u8) {
    append_wrapped(b, node, node.precedence() < min_precedence);
}

fn append_list(b: &mut SqlBuilder, nodes: &[NodeRef]) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        node.append_to(b);
    }
}

fn needs_parens(parent: BinaryOp, child: &Node, right: bool) -> bool {
    let child_op = match &child.kind {
        NodeKind::Binary { op, .. } => Some(*op),
        _ => None,
    };
    if parent.is_connective() {
        if let Some(op) = child_op {
            if op.is_connective() && op != parent {
                return true;
            }
        }
    }
    let child_precedence = child.precedence();
    let precedence = parent.precedence();
    if child_precedence != precedence {
        return child_precedence < precedence;
    }
    // Equal precedence: left-associative, so only the right side can need
    // parentheses, unless regrouping the same associative operator.
    right && !(parent.is_associative() && child_op == Some(parent))
}
