//! Expression lowering.
//!
//! Every compound expression is flattened into temporaries so that each
//! data instruction reads at most two operands. Reads of state variables
//! and access paths go through `Load`; writes go through [`Lowerer::write`].

use slir_ir::ast::{BinaryOp, ExprKind, Literal, TypeName, UnaryOp};
use slir_ir::{ensure_sufficient_stack, ExprId, FunctionId, Name, Span, VariableId};
use slir_types::{Elementary, Idx, TypeData};

use super::{Lowerer, Place, Value};
use crate::ir::{Constant, EnvVar, InstrKind, Operand, StoreMode, VarId, VarKind};

/// What an identifier names inside the function body.
pub(super) enum NameRef {
    Local(VarId),
    State(VariableId),
    Unbound,
}

impl Lowerer<'_> {
    pub(super) fn lower_expr(&mut self, id: ExprId) -> Value {
        ensure_sufficient_stack(|| self.lower_expr_inner(id))
    }

    fn lower_expr_inner(&mut self, id: ExprId) -> Value {
        let arena = self.arena;
        let expr = arena.expr(id);
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => Self::lower_literal(lit),
            ExprKind::Ident(name) => self.lower_ident(*name, span),
            ExprKind::ElementaryType(ty) => {
                let ty = self.resolve_ty(ty);
                Value {
                    op: Operand::Const(Constant::Type(ty)),
                    ty,
                }
            }
            ExprKind::Member { base, member } => self.lower_member(id, *base, *member, span),
            ExprKind::Index { base, index: None } => {
                // Type expression `T[]`, as in `abi.decode(data, (uint256[]))`.
                let elem = match &arena.expr(*base).kind {
                    ExprKind::ElementaryType(ty) => self.resolve_ty(ty),
                    ExprKind::Ident(name) => self
                        .program
                        .type_named(self.contract, *name)
                        .unwrap_or(Idx::ERROR),
                    _ => Idx::ERROR,
                };
                let ty = self.pool.array(elem, None);
                Value {
                    op: Operand::Const(Constant::Type(ty)),
                    ty,
                }
            }
            ExprKind::Index { .. } => match self.lower_place(id) {
                Some(place) => self.read(place, span),
                None => self.unsupported("index access", span),
            },
            ExprKind::Call { callee, args } => self.lower_call(*callee, args, span),
            ExprKind::CallOptions { .. } => self.unsupported("call options without a call", span),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, *lhs, *rhs, span),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, *operand, span),
            ExprKind::Assign { op, lhs, rhs } => self.lower_assign(*op, *lhs, *rhs, span),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.lower_conditional(*cond, *then_expr, *else_expr, span),
            ExprKind::Tuple(items) => self.lower_tuple_value(items, span),
            ExprKind::InlineArray(items) => {
                let values: Vec<Value> = items.iter().map(|item| self.lower_expr(*item)).collect();
                let elem = values.first().map_or(Idx::ERROR, |v| v.ty);
                let ty = self.pool.array(elem, Some(values.len() as u64));
                let dst = self.builder.temp(ty);
                let args = values.iter().map(|v| v.op).collect();
                self.emit(InstrKind::Construct { dst, ty, args }, span);
                Value::var(dst, ty)
            }
            ExprKind::New(_) => self.unsupported("`new` without constructor arguments", span),
            ExprKind::Opaque(kind) => {
                let construct = self.name(*kind).to_string();
                self.unsupported(construct, span)
            }
        }
    }

    fn lower_literal(lit: &Literal) -> Value {
        let (constant, ty) = match lit {
            Literal::Bool(b) => (Constant::Bool(*b), Idx::BOOL),
            Literal::Number { value, unit } => (
                Constant::Number {
                    value: *value,
                    unit: *unit,
                },
                Idx::UINT256,
            ),
            Literal::String(s) => (Constant::String(*s), Idx::STRING),
            Literal::HexString(s) => (Constant::Hex(*s), Idx::BYTES),
            Literal::Address(s) => (Constant::Address(*s), Idx::ADDRESS),
        };
        Value {
            op: Operand::Const(constant),
            ty,
        }
    }

    // Names

    pub(super) fn resolve_name(&self, name: Name) -> NameRef {
        if let Some(var) = self.scope.lookup(name) {
            return NameRef::Local(var);
        }
        self.contract
            .and_then(|c| self.program.lookup_state_variable(c, name))
            .map_or(NameRef::Unbound, NameRef::State)
    }

    pub(super) fn resolve_ty(&self, ty: &TypeName) -> Idx {
        self.program
            .resolve_type(self.contract, ty)
            .unwrap_or(Idx::ERROR)
    }

    pub(super) fn contract_ty(&self) -> Idx {
        match self.contract {
            Some(id) => {
                let c = self.program.contract(id);
                self.pool.contract(id, c.name, c.kind)
            }
            None => Idx::ADDRESS,
        }
    }

    pub(super) fn function_ty(&self, function: FunctionId) -> Idx {
        let f = self.program.function(function);
        let params = f.params.iter().map(|p| self.program.variable(*p).ty).collect();
        let returns = f.returns.iter().map(|r| self.program.variable(*r).ty).collect();
        self.pool.function(params, returns, false)
    }

    /// Result type of calling `function`: its single return, a tuple, or unit.
    pub(super) fn returns_ty(&self, function: FunctionId) -> Idx {
        let f = self.program.function(function);
        let returns: Vec<Idx> = f.returns.iter().map(|r| self.program.variable(*r).ty).collect();
        if returns.is_empty() {
            Idx::UNIT
        } else {
            self.pool.tuple(returns)
        }
    }

    pub(super) fn lower_ident(&mut self, name: Name, span: Span) -> Value {
        match self.resolve_name(name) {
            NameRef::Local(var) => Value::var(var, self.var_ty(var)),
            NameRef::State(id) => {
                let slot = self.slot(id);
                self.read(Place::State(slot), span)
            }
            NameRef::Unbound => {
                let text = self.name(name);
                match text {
                    "now" => Value {
                        op: Operand::Env(EnvVar::Now),
                        ty: EnvVar::Now.ty(),
                    },
                    "this" => Value {
                        op: Operand::Env(EnvVar::This),
                        ty: self.contract_ty(),
                    },
                    _ => {
                        if let Some(function) = self.function_named(name) {
                            return Value {
                                op: Operand::Func(function),
                                ty: self.function_ty(function),
                            };
                        }
                        if let Some(ty) = self.program.type_named(self.contract, name) {
                            return Value {
                                op: Operand::Const(Constant::Type(ty)),
                                ty,
                            };
                        }
                        self.unsupported(format!("unresolved identifier `{text}`"), span)
                    }
                }
            }
        }
    }

    /// First function called `name` visible from the current contract, or
    /// a free function.
    fn function_named(&self, name: Name) -> Option<FunctionId> {
        self.contract
            .and_then(|c| self.program.functions_named(c, name).first().copied())
            .or_else(|| self.program.free_functions_named(name).first().copied())
    }

    /// An unshadowed identifier naming a namespace rather than a value:
    /// `msg`, `abi`, `super`, a contract, an enum.
    pub(super) fn is_namespace_base(&self, base: ExprId) -> bool {
        let ExprKind::Ident(name) = &self.arena.expr(base).kind else {
            return false;
        };
        if !matches!(self.resolve_name(*name), NameRef::Unbound) {
            return false;
        }
        let text = self.name(*name);
        EnvVar::is_namespace(text)
            || matches!(text, "abi" | "super")
            || self.program.contract_named(*name).is_some()
            || self.program.type_named(self.contract, *name).is_some()
    }

    // Members and access paths

    fn lower_member(&mut self, id: ExprId, base: ExprId, member: Name, span: Span) -> Value {
        if self.is_namespace_base(base) {
            return self.lower_namespace_member(base, member, span);
        }
        match self.lower_place(id) {
            Some(place) => self.read(place, span),
            None => self.unsupported("member access", span),
        }
    }

    /// `msg.sender`, `Enum.Variant`, `Library.CONSTANT`.
    fn lower_namespace_member(&mut self, base: ExprId, member: Name, span: Span) -> Value {
        let arena = self.arena;
        let ExprKind::Ident(base_name) = arena.expr(base).kind else {
            return self.unsupported("member access", span);
        };
        let (base_text, member_text) = (self.name(base_name), self.name(member));

        if EnvVar::is_namespace(base_text) {
            return match EnvVar::lookup(base_text, member_text) {
                Some(env) => Value {
                    op: Operand::Env(env),
                    ty: env.ty(),
                },
                None => self.unsupported(
                    format!("unknown builtin member `{base_text}.{member_text}`"),
                    span,
                ),
            };
        }

        if let Some(contract) = self.program.contract_named(base_name) {
            if let Some(var) = self.program.lookup_state_variable(contract, member) {
                let slot = self.slot(var);
                return self.read(Place::State(slot), span);
            }
            if let Some(function) = self.program.functions_named(contract, member).first() {
                return Value {
                    op: Operand::Func(*function),
                    ty: self.function_ty(*function),
                };
            }
        }

        if let Some(ty) = self.program.type_named(self.contract, base_name) {
            if let TypeData::Enum { variants, .. } = self.pool.get(ty) {
                if let Some(index) = variants.iter().position(|v| *v == member) {
                    return Value {
                        op: Operand::Const(Constant::EnumVariant {
                            ty,
                            index: u32::try_from(index).unwrap_or(u32::MAX),
                        }),
                        ty,
                    };
                }
            }
        }

        self.unsupported(
            format!("unknown builtin member `{base_text}.{member_text}`"),
            span,
        )
    }

    /// Lower an expression that designates a location. Returns `None`
    /// (without emitting anything) for shapes that are not places.
    pub(super) fn lower_place(&mut self, id: ExprId) -> Option<Place> {
        let arena = self.arena;
        let expr = arena.expr(id);
        let span = expr.span;
        match &expr.kind {
            ExprKind::Ident(name) => match self.resolve_name(*name) {
                NameRef::Local(var) => Some(Place::Local(var)),
                NameRef::State(var) => Some(Place::State(self.slot(var))),
                NameRef::Unbound => None,
            },
            ExprKind::Tuple(items) if items.len() == 1 => items[0].and_then(|e| self.lower_place(e)),
            ExprKind::Member { base, member } => {
                if self.is_namespace_base(*base) {
                    return None;
                }
                let (base_op, base_ty, root) = self.lower_base(*base);
                let Some(ty) = self.member_ty(base_ty, *member) else {
                    let text = format!(
                        "unknown builtin member `{}.{}`",
                        self.program.display_type(base_ty),
                        self.name(*member)
                    );
                    let Value { op, .. } = self.unsupported(text, span);
                    return op.as_var().map(Place::Local);
                };
                let dst = self.builder.reference(ty, root);
                self.emit(
                    InstrKind::Member {
                        dst,
                        base: base_op,
                        member: *member,
                    },
                    span,
                );
                Some(self.path(dst))
            }
            ExprKind::Index {
                base,
                index: Some(index),
            } => {
                let (base_op, base_ty, root) = self.lower_base(*base);
                let index = self.lower_expr(*index).op;
                let ty = self
                    .pool
                    .index_result(self.pool.canonical(base_ty))
                    .unwrap_or(Idx::ERROR);
                let dst = self.builder.reference(ty, root);
                self.emit(
                    InstrKind::Index {
                        dst,
                        base: base_op,
                        index: Some(index),
                    },
                    span,
                );
                Some(self.path(dst))
            }
            _ => None,
        }
    }

    fn path(&self, reference: VarId) -> Place {
        let root = self.builder.var(reference).root.unwrap_or(reference);
        Place::Path { reference, root }
    }

    /// Base of an access path: the place itself when there is one (no
    /// load), otherwise the evaluated value.
    fn lower_base(&mut self, base: ExprId) -> (Operand<VarId>, Idx, Option<VarId>) {
        match self.lower_place(base) {
            Some(place) => {
                let var = Self::place_var(place);
                (Operand::Var(var), self.var_ty(var), Some(self.root_of(place)))
            }
            None => {
                let value = self.lower_expr(base);
                (value.op, value.ty, None)
            }
        }
    }

    /// `None` for a member address types do not have.
    fn member_ty(&self, base_ty: Idx, member: Name) -> Option<Idx> {
        let canonical = self.pool.canonical(base_ty);
        if let Some(field) = self.pool.struct_field(canonical, member) {
            return Some(field);
        }
        let text = self.name(member);
        if self.pool.is_address(canonical) {
            return match text {
                "balance" => Some(Idx::UINT256),
                "code" => Some(Idx::BYTES),
                "codehash" => Some(Idx::BYTES32),
                _ => None,
            };
        }
        let has_length = matches!(
            self.pool.get(canonical),
            TypeData::Array { .. }
                | TypeData::Elementary(
                    Elementary::Bytes | Elementary::String | Elementary::FixedBytes(_)
                )
        );
        if text == "length" && has_length {
            return Some(Idx::UINT256);
        }
        Some(Idx::ERROR)
    }

    // Operators

    fn lower_binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId, span: Span) -> Value {
        if op.is_short_circuit() {
            return self.lower_short_circuit(op, lhs, rhs, span);
        }
        let l = self.lower_expr(lhs);
        let r = self.lower_expr(rhs);
        let ty = if op.is_comparison() {
            Idx::BOOL
        } else if matches!(l.op, Operand::Const(_)) {
            r.ty
        } else {
            l.ty
        };
        let dst = self.builder.temp(ty);
        self.emit(
            InstrKind::Binary {
                dst,
                op,
                lhs: l.op,
                rhs: r.op,
            },
            span,
        );
        Value::var(dst, ty)
    }

    /// `a && b` evaluates `b` only when `a` holds; `a || b` only when it
    /// does not. The result is a temporary assigned on both paths.
    fn lower_short_circuit(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId, span: Span) -> Value {
        let l = self.lower_expr(lhs);
        let result = self.builder.temp(Idx::BOOL);
        self.emit(
            InstrKind::Assign {
                dst: result,
                value: l.op,
            },
            span,
        );
        let rhs_label = self.builder.new_label();
        let end_label = self.builder.new_label();
        let (then_label, else_label) = match op {
            BinaryOp::And => (rhs_label, end_label),
            _ => (end_label, rhs_label),
        };
        self.emit(
            InstrKind::Branch {
                cond: Operand::Var(result),
                then_label,
                else_label,
            },
            span,
        );
        self.builder.place_label(rhs_label, span);
        let r = self.lower_expr(rhs);
        self.emit(
            InstrKind::Assign {
                dst: result,
                value: r.op,
            },
            span,
        );
        self.emit(InstrKind::Jump { target: end_label }, span);
        self.builder.place_label(end_label, span);
        Value::var(result, Idx::BOOL)
    }

    fn lower_conditional(
        &mut self,
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
        span: Span,
    ) -> Value {
        let c = self.lower_expr(cond);
        let then_label = self.builder.new_label();
        let else_label = self.builder.new_label();
        let end_label = self.builder.new_label();
        let result = self.builder.temp(Idx::ERROR);
        self.emit(
            InstrKind::Branch {
                cond: c.op,
                then_label,
                else_label,
            },
            span,
        );

        self.builder.place_label(then_label, span);
        let a = self.lower_expr(then_expr);
        self.emit(
            InstrKind::Assign {
                dst: result,
                value: a.op,
            },
            span,
        );
        self.emit(InstrKind::Jump { target: end_label }, span);

        self.builder.place_label(else_label, span);
        let b = self.lower_expr(else_expr);
        self.emit(
            InstrKind::Assign {
                dst: result,
                value: b.op,
            },
            span,
        );
        self.emit(InstrKind::Jump { target: end_label }, span);
        self.builder.place_label(end_label, span);

        let ty = if a.ty.is_error() { b.ty } else { a.ty };
        self.builder.set_ty(result, ty);
        Value::var(result, ty)
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: ExprId, span: Span) -> Value {
        match op {
            UnaryOp::Not | UnaryOp::Neg | UnaryOp::BitNot => {
                let v = self.lower_expr(operand);
                let ty = if op == UnaryOp::Not { Idx::BOOL } else { v.ty };
                let dst = self.builder.temp(ty);
                self.emit(
                    InstrKind::Unary {
                        dst,
                        op,
                        operand: v.op,
                    },
                    span,
                );
                Value::var(dst, ty)
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let Some(place) = self.lower_place(operand) else {
                    return self.unsupported(format!("`{op}` on a non-location"), span);
                };
                let mut old = self.read(place, span);
                let post = matches!(op, UnaryOp::PostInc | UnaryOp::PostDec);
                if post {
                    old = self.snapshot(old, span);
                }
                let bop = match op {
                    UnaryOp::PreInc | UnaryOp::PostInc => BinaryOp::Add,
                    _ => BinaryOp::Sub,
                };
                let one = Operand::Const(Constant::Number {
                    value: self.intern("1"),
                    unit: None,
                });
                let new = self.builder.temp(old.ty);
                self.emit(
                    InstrKind::Binary {
                        dst: new,
                        op: bop,
                        lhs: old.op,
                        rhs: one,
                    },
                    span,
                );
                self.write(place, Some(Operand::Var(new)), StoreMode::Assign, span);
                if post {
                    old
                } else {
                    Value::var(new, old.ty)
                }
            }
            UnaryOp::Delete => {
                let Some(place) = self.lower_place(operand) else {
                    return self.unsupported("`delete` on a non-location", span);
                };
                self.write(place, None, StoreMode::Delete, span);
                Value::unit()
            }
        }
    }

    /// Copy a named variable's current value into a temporary, so a later
    /// write to the variable does not change what this value reads.
    pub(super) fn snapshot(&mut self, value: Value, span: Span) -> Value {
        match value.op {
            Operand::Var(var) if self.builder.var(var).kind != VarKind::Temp => {
                let dst = self.builder.temp(value.ty);
                self.emit(
                    InstrKind::Assign {
                        dst,
                        value: value.op,
                    },
                    span,
                );
                Value::var(dst, value.ty)
            }
            _ => value,
        }
    }

    // Assignment

    fn lower_assign(
        &mut self,
        op: Option<BinaryOp>,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    ) -> Value {
        let arena = self.arena;
        if let ExprKind::Tuple(targets) = &arena.expr(lhs).kind {
            if targets.len() != 1 {
                return self.lower_tuple_assign(targets, rhs, span);
            }
        }

        match op {
            None => {
                let value = self.lower_expr(rhs);
                let Some(place) = self.lower_place(lhs) else {
                    let what = arena.expr(lhs).kind.describe();
                    return self.unsupported(format!("assignment to {what}"), span);
                };
                self.write(place, Some(value.op), StoreMode::Assign, span);
                value
            }
            Some(bop) => {
                let Some(place) = self.lower_place(lhs) else {
                    let what = arena.expr(lhs).kind.describe();
                    return self.unsupported(format!("compound assignment to {what}"), span);
                };
                let current = self.read(place, span);
                let r = self.lower_expr(rhs);
                let dst = self.builder.temp(current.ty);
                self.emit(
                    InstrKind::Binary {
                        dst,
                        op: bop,
                        lhs: current.op,
                        rhs: r.op,
                    },
                    span,
                );
                self.write(place, Some(Operand::Var(dst)), StoreMode::Assign, span);
                Value::var(dst, current.ty)
            }
        }
    }

    /// `(a, b) = (b, a)` or `(a, , c) = f()`: every right-hand value is
    /// computed first, then assigned left to right.
    fn lower_tuple_assign(&mut self, targets: &[Option<ExprId>], rhs: ExprId, span: Span) -> Value {
        let values = self.lower_tuple_parts(targets.len(), rhs, span);
        for (target, value) in targets.iter().zip(values) {
            let (Some(target), Some(value)) = (target, value) else {
                continue;
            };
            match self.lower_place(*target) {
                Some(place) => self.write(place, Some(value.op), StoreMode::Assign, span),
                None => {
                    let what = self.arena.expr(*target).kind.describe();
                    self.unsupported(format!("assignment to {what}"), span);
                }
            }
        }
        Value::unit()
    }

    /// The element values of a tuple-valued expression, `len` of them.
    ///
    /// A literal tuple is evaluated element-wise (named variables are
    /// snapshotted so later element writes cannot clobber them); anything
    /// else lands in one tuple temporary and is split with `Extract`.
    pub(super) fn lower_tuple_parts(
        &mut self,
        len: usize,
        rhs: ExprId,
        span: Span,
    ) -> Vec<Option<Value>> {
        let arena = self.arena;
        if let ExprKind::Tuple(items) = &arena.expr(rhs).kind {
            if items.len() == len {
                let mut values = Vec::with_capacity(len);
                for item in items {
                    let value = item.map(|e| self.lower_expr(e));
                    values.push(value.map(|v| self.snapshot(v, span)));
                }
                return values;
            }
        }

        let tuple = self.lower_expr(rhs);
        let tuple_var = match tuple.op {
            Operand::Var(var) => var,
            other => {
                let dst = self.builder.temp(tuple.ty);
                self.emit(InstrKind::Assign { dst, value: other }, span);
                dst
            }
        };
        let elems = self.pool.tuple_elems(tuple.ty);
        (0..len)
            .map(|i| {
                let ty = elems.get(i).copied().unwrap_or(Idx::ERROR);
                let dst = self.builder.temp(ty);
                self.emit(
                    InstrKind::Extract {
                        dst,
                        tuple: tuple_var,
                        index: u32::try_from(i).unwrap_or(u32::MAX),
                    },
                    span,
                );
                Some(Value::var(dst, ty))
            })
            .collect()
    }

    fn lower_tuple_value(&mut self, items: &[Option<ExprId>], span: Span) -> Value {
        if let [Some(inner)] = items {
            return self.lower_expr(*inner);
        }
        let values: Vec<Value> = items
            .iter()
            .map(|item| match item {
                Some(e) => self.lower_expr(*e),
                None => Value::unit(),
            })
            .collect();
        let ty = self.pool.tuple(values.iter().map(|v| v.ty).collect());
        let dst = self.builder.temp(ty);
        let args = values.iter().map(|v| v.op).collect();
        self.emit(InstrKind::Construct { dst, ty, args }, span);
        Value::var(dst, ty)
    }
}
