//! Fluent construction of normalized ASTs.
//!
//! Used by front-end adapters and by tests throughout the workspace. Every
//! allocated node gets a distinct one-byte span in allocation order, so
//! diagnostics produced from built trees point at something identifiable.

use crate::{ExprId, Name, Span, StmtId, StringInterner};

use super::{
    AstArena, BinaryOp, ExprKind, FunctionDecl, FunctionKind, Literal, StmtKind, TypeName,
    UnaryOp, VarDecl,
};

pub struct AstBuilder<'a> {
    interner: &'a StringInterner,
    arena: AstArena,
    pos: u32,
}

impl<'a> AstBuilder<'a> {
    pub fn new(interner: &'a StringInterner) -> Self {
        Self {
            interner,
            arena: AstArena::new(),
            pos: 1,
        }
    }

    /// Finish building and hand over the arena.
    pub fn finish(self) -> AstArena {
        self.arena
    }

    pub fn arena(&self) -> &AstArena {
        &self.arena
    }

    fn next_span(&mut self) -> Span {
        let span = Span::new(self.pos, self.pos + 1);
        self.pos += 1;
        span
    }

    fn expr(&mut self, kind: ExprKind) -> ExprId {
        let span = self.next_span();
        self.arena.alloc_expr(kind, span)
    }

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.next_span();
        self.arena.alloc_stmt(kind, span)
    }

    // Names and types

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn elementary(&self, spelling: &str) -> TypeName {
        TypeName::Elementary(self.name(spelling))
    }

    /// `Token` or `Vault.Position`.
    pub fn user_type(&self, path: &str) -> TypeName {
        TypeName::UserDefined(path.split('.').map(|p| self.name(p)).collect())
    }

    pub fn descriptor(&self, text: &str) -> TypeName {
        TypeName::Descriptor(self.name(text))
    }

    pub fn var(&mut self, name: &str, ty: TypeName) -> VarDecl {
        let mut decl = VarDecl::new(self.name(name), ty);
        decl.span = self.next_span();
        decl
    }

    /// A function declaration with a body.
    pub fn function(
        &mut self,
        name: &str,
        params: Vec<VarDecl>,
        returns: Vec<VarDecl>,
        body: StmtId,
    ) -> FunctionDecl {
        let mut decl = FunctionDecl::new(self.name(name), FunctionKind::Function);
        decl.params = params;
        decl.returns = returns;
        decl.body = Some(body);
        decl.span = self.next_span();
        decl
    }

    // Expressions

    pub fn number(&mut self, digits: &str) -> ExprId {
        let value = self.name(digits);
        self.expr(ExprKind::Literal(Literal::Number { value, unit: None }))
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string(&mut self, text: &str) -> ExprId {
        let text = self.name(text);
        self.expr(ExprKind::Literal(Literal::String(text)))
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        let name = self.name(name);
        self.expr(ExprKind::Ident(name))
    }

    pub fn member(&mut self, base: ExprId, member: &str) -> ExprId {
        let member = self.name(member);
        self.expr(ExprKind::Member { base, member })
    }

    pub fn index(&mut self, base: ExprId, index: ExprId) -> ExprId {
        self.expr(ExprKind::Index {
            base,
            index: Some(index),
        })
    }

    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Call { callee, args })
    }

    /// `name(args)`.
    pub fn call_named(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.ident(name);
        self.call(callee, args)
    }

    /// `base.method(args)`.
    pub fn method_call(&mut self, base: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.member(base, method);
        self.call(callee, args)
    }

    pub fn call_options(&mut self, callee: ExprId, options: Vec<(&str, ExprId)>) -> ExprId {
        let options = options
            .into_iter()
            .map(|(name, value)| (self.name(name), value))
            .collect();
        self.expr(ExprKind::CallOptions { callee, options })
    }

    /// `T(arg)` for an elementary type spelling.
    pub fn convert(&mut self, spelling: &str, arg: ExprId) -> ExprId {
        let ty = self.elementary(spelling);
        let callee = self.expr(ExprKind::ElementaryType(ty));
        self.call(callee, vec![arg])
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, lhs, rhs })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.expr(ExprKind::Unary { op, operand })
    }

    pub fn assign(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(ExprKind::Assign { op: None, lhs, rhs })
    }

    pub fn assign_op(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(ExprKind::Assign {
            op: Some(op),
            lhs,
            rhs,
        })
    }

    pub fn conditional(&mut self, cond: ExprId, then_expr: ExprId, else_expr: ExprId) -> ExprId {
        self.expr(ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        })
    }

    pub fn tuple(&mut self, items: Vec<Option<ExprId>>) -> ExprId {
        self.expr(ExprKind::Tuple(items))
    }

    pub fn inline_array(&mut self, items: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::InlineArray(items))
    }

    pub fn new_expr(&mut self, ty: TypeName) -> ExprId {
        self.expr(ExprKind::New(ty))
    }

    pub fn opaque(&mut self, kind: &str) -> ExprId {
        let kind = self.name(kind);
        self.expr(ExprKind::Opaque(kind))
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn unchecked(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Unchecked(stmts))
    }

    /// `ty name = init;`
    pub fn local(&mut self, name: &str, ty: TypeName, init: Option<ExprId>) -> StmtId {
        let decl = self.var(name, ty);
        self.stmt(StmtKind::VarDecl {
            decls: vec![Some(decl)],
            init,
        })
    }

    /// `(ty a, , ty c) = init;`
    pub fn local_tuple(&mut self, decls: Vec<Option<VarDecl>>, init: ExprId) -> StmtId {
        self.stmt(StmtKind::VarDecl {
            decls,
            init: Some(init),
        })
    }

    pub fn if_(&mut self, cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId>) -> StmtId {
        self.stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn while_(&mut self, cond: ExprId, body: StmtId) -> StmtId {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn do_while(&mut self, body: StmtId, cond: ExprId) -> StmtId {
        self.stmt(StmtKind::DoWhile { body, cond })
    }

    pub fn for_(
        &mut self,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    ) -> StmtId {
        self.stmt(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    pub fn break_(&mut self) -> StmtId {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_(&mut self) -> StmtId {
        self.stmt(StmtKind::Continue)
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return(value))
    }

    pub fn emit(&mut self, event: &str, args: Vec<ExprId>) -> StmtId {
        let event = self.name(event);
        self.stmt(StmtKind::Emit { event, args })
    }

    pub fn revert(&mut self, args: Vec<ExprId>) -> StmtId {
        self.stmt(StmtKind::Revert { error: None, args })
    }

    pub fn throw(&mut self) -> StmtId {
        self.stmt(StmtKind::Throw)
    }

    pub fn placeholder(&mut self) -> StmtId {
        self.stmt(StmtKind::Placeholder)
    }

    pub fn inline_assembly(&mut self) -> StmtId {
        self.stmt(StmtKind::InlineAssembly)
    }

    pub fn try_stmt(&mut self) -> StmtId {
        self.stmt(StmtKind::Try)
    }
}
