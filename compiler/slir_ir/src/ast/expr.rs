//! Expression nodes.

use crate::{ExprId, Name, Span};

use super::{BinaryOp, TypeName, UnaryOp};

/// Literal value as written.
///
/// Numbers keep their source text; no arithmetic is ever performed on them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Literal {
    Bool(bool),
    /// Decimal or hex digits, with an optional unit (`ether`, `days`).
    Number { value: Name, unit: Option<Name> },
    String(Name),
    HexString(Name),
    /// Checksummed address literal.
    Address(Name),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Closed set of expression shapes every front-end normalizes into.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExprKind {
    Literal(Literal),
    Ident(Name),
    /// An elementary type used as a value: callee of `uint8(x)` or `address(0)`.
    ElementaryType(TypeName),
    Member {
        base: ExprId,
        member: Name,
    },
    /// `base[index]`; `index` is `None` for the type expression `T[]`.
    Index {
        base: ExprId,
        index: Option<ExprId>,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    /// `callee{value: v, gas: g}`.
    CallOptions {
        callee: ExprId,
        options: Vec<(Name, ExprId)>,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    /// `lhs = rhs` when `op` is `None`, `lhs op= rhs` otherwise.
    Assign {
        op: Option<BinaryOp>,
        lhs: ExprId,
        rhs: ExprId,
    },
    Conditional {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    /// `(a, , c)`: missing components are `None`.
    Tuple(Vec<Option<ExprId>>),
    InlineArray(Vec<ExprId>),
    /// `new T`; applied to constructor arguments through `Call`.
    New(TypeName),
    /// A node kind the front-end could not normalize, by its source name.
    Opaque(Name),
}

impl ExprKind {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Literal(_) => "literal",
            ExprKind::Ident(_) => "identifier",
            ExprKind::ElementaryType(_) => "elementary type expression",
            ExprKind::Member { .. } => "member access",
            ExprKind::Index { .. } => "index access",
            ExprKind::Call { .. } => "call",
            ExprKind::CallOptions { .. } => "call options",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Conditional { .. } => "conditional expression",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::InlineArray(_) => "inline array",
            ExprKind::New(_) => "new expression",
            ExprKind::Opaque(_) => "opaque expression",
        }
    }
}
