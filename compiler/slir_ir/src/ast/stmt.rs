//! Statement nodes.

use crate::{ExprId, Name, Span, StmtId};

use super::VarDecl;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum StmtKind {
    Block(Vec<StmtId>),
    /// `unchecked { ... }`; lowered like a plain block.
    Unchecked(Vec<StmtId>),
    Expr(ExprId),
    /// `T a = e;` or `(T a, , U c) = e;`. Missing tuple components are `None`.
    VarDecl {
        decls: Vec<Option<VarDecl>>,
        init: Option<ExprId>,
    },
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        cond: ExprId,
    },
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    },
    Break,
    Continue,
    Return(Option<ExprId>),
    Emit {
        event: Name,
        args: Vec<ExprId>,
    },
    /// `revert(...)` statement form, optionally naming a custom error.
    Revert {
        error: Option<Name>,
        args: Vec<ExprId>,
    },
    /// Pre-0.5 `throw`.
    Throw,
    /// The `_` in a modifier body.
    Placeholder,
    InlineAssembly,
    Try,
    /// A statement kind the front-end could not normalize, by its source name.
    Opaque(Name),
}

impl StmtKind {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Block(_) => "block",
            StmtKind::Unchecked(_) => "unchecked block",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::VarDecl { .. } => "variable declaration",
            StmtKind::If { .. } => "if statement",
            StmtKind::While { .. } => "while loop",
            StmtKind::DoWhile { .. } => "do-while loop",
            StmtKind::For { .. } => "for loop",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Return(_) => "return",
            StmtKind::Emit { .. } => "emit",
            StmtKind::Revert { .. } => "revert",
            StmtKind::Throw => "throw",
            StmtKind::Placeholder => "modifier placeholder",
            StmtKind::InlineAssembly => "inline assembly",
            StmtKind::Try => "try/catch",
            StmtKind::Opaque(_) => "opaque statement",
        }
    }
}
