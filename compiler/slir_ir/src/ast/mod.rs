//! Normalized contract AST.
//!
//! Front-ends for every dialect and compiler version hand the core one
//! [`SourceUnit`] per compilation unit. Declarations are plain structs;
//! statement and expression bodies live in a flat [`AstArena`] and are
//! referenced by [`StmtId`]/[`ExprId`].
//!
//! The node enums are closed: lowering matches them exhaustively, and a
//! shape it does not handle is reported, never skipped silently.

mod builder;
mod expr;
mod ops;
mod stmt;
mod types;

pub use builder::AstBuilder;
pub use expr::{Expr, ExprKind, Literal};
pub use ops::{BinaryOp, UnaryOp};
pub use stmt::{Stmt, StmtKind};
pub use types::TypeName;

use crate::{ExprId, Name, Span, StmtId};

// ── Source units ────────────────────────────────────────────────────

/// Compiler version a unit was produced with.
///
/// Selects legacy behavior: function-scoped locals and constructors named
/// after their contract both ended with 0.5.0.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompilerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CompilerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Locals are visible throughout the function body.
    pub fn has_function_scoping(self) -> bool {
        self < Self::new(0, 5, 0)
    }

    /// A function named after its contract is its constructor.
    pub fn has_named_constructors(self) -> bool {
        self < Self::new(0, 5, 0)
    }
}

/// One normalized compilation unit.
#[derive(Clone, Debug, Default)]
pub struct SourceUnit {
    pub path: Name,
    pub compiler_version: Option<CompilerVersion>,
    pub contracts: Vec<ContractDecl>,
    /// Free (file-level) functions.
    pub functions: Vec<FunctionDecl>,
    pub structs: Vec<StructDecl>,
    pub enums: Vec<EnumDecl>,
    pub arena: AstArena,
}

impl SourceUnit {
    pub fn new(path: Name) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }
}

// ── Arena ───────────────────────────────────────────────────────────

/// Flat storage for a unit's statements and expressions.
#[derive(Clone, Debug, Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId::from_len(self.exprs.len());
        self.exprs.push(Expr { kind, span });
        id
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId::from_len(self.stmts.len());
        self.stmts.push(Stmt { kind, span });
        id
    }

    /// # Panics
    /// Panics if `id` was allocated by a different arena.
    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// # Panics
    /// Panics if `id` was allocated by a different arena.
    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

// ── Declarations ────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

/// Data location of a variable.
///
/// `Default` is what a declaration gets when the source names no location
/// (state variables, value-type locals, every Vyper local).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Location {
    #[default]
    Default,
    Storage,
    Memory,
    Calldata,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Visibility {
    #[default]
    Public,
    External,
    Internal,
    Private,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Mutability {
    Pure,
    View,
    Payable,
    #[default]
    NonPayable,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FunctionKind {
    #[default]
    Function,
    Constructor,
    Fallback,
    Receive,
    Modifier,
    /// Synthesized by the model to run state-variable initializers.
    StateInitializer,
}

/// Variable declaration: state variable, parameter, return, local or field.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VarDecl {
    /// `Name::EMPTY` for unnamed parameters and returns.
    pub name: Name,
    pub ty: TypeName,
    pub location: Location,
    pub is_constant: bool,
    pub is_immutable: bool,
    pub initializer: Option<ExprId>,
    pub span: Span,
}

impl VarDecl {
    pub fn new(name: Name, ty: TypeName) -> Self {
        Self {
            name,
            ty,
            location: Location::Default,
            is_constant: false,
            is_immutable: false,
            initializer: None,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_initializer(mut self, init: ExprId) -> Self {
        self.initializer = Some(init);
        self
    }
}

/// A modifier applied to a function, or a base-constructor call in a
/// constructor header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModifierInvocation {
    pub name: Name,
    pub args: Vec<ExprId>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionDecl {
    pub name: Name,
    pub kind: FunctionKind,
    pub params: Vec<VarDecl>,
    pub returns: Vec<VarDecl>,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub is_virtual: bool,
    pub is_override: bool,
    pub modifiers: Vec<ModifierInvocation>,
    /// `None` for unimplemented declarations (interfaces, abstract stubs).
    pub body: Option<StmtId>,
    pub documentation: Option<String>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: Name, kind: FunctionKind) -> Self {
        Self {
            name,
            kind,
            params: Vec::new(),
            returns: Vec::new(),
            visibility: Visibility::Public,
            mutability: Mutability::NonPayable,
            is_virtual: false,
            is_override: false,
            modifiers: Vec::new(),
            body: None,
            documentation: None,
            span: Span::DUMMY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventDecl {
    pub name: Name,
    pub params: Vec<VarDecl>,
    pub anonymous: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StructDecl {
    pub name: Name,
    pub fields: Vec<VarDecl>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EnumDecl {
    pub name: Name,
    pub variants: Vec<Name>,
    pub span: Span,
}

/// Entry in a contract's inheritance list.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BaseSpec {
    pub name: Name,
    /// Base-constructor arguments given in the inheritance list.
    pub args: Vec<ExprId>,
    pub span: Span,
}

/// `using Library for Type;` (`target == None` for `*`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UsingFor {
    pub library: Name,
    pub target: Option<TypeName>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContractDecl {
    pub name: Name,
    pub kind: ContractKind,
    pub is_abstract: bool,
    /// Direct bases, ordered as written.
    pub bases: Vec<BaseSpec>,
    pub state_vars: Vec<VarDecl>,
    pub functions: Vec<FunctionDecl>,
    pub modifiers: Vec<FunctionDecl>,
    pub events: Vec<EventDecl>,
    pub structs: Vec<StructDecl>,
    pub enums: Vec<EnumDecl>,
    pub using_for: Vec<UsingFor>,
    /// Passed through untouched.
    pub documentation: Option<String>,
    pub span: Span,
}

impl ContractDecl {
    pub fn new(name: Name, kind: ContractKind) -> Self {
        Self {
            name,
            kind,
            is_abstract: false,
            bases: Vec::new(),
            state_vars: Vec::new(),
            functions: Vec::new(),
            modifiers: Vec::new(),
            events: Vec::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            using_for: Vec::new(),
            documentation: None,
            span: Span::DUMMY,
        }
    }
}
