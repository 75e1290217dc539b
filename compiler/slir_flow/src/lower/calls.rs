//! Call lowering: classifies every call site by callee shape.
//!
//! The receiver of a member call is evaluated before the arguments, and
//! call options (`{value: v, gas: g}`) after them.

use slir_ir::ast::{ExprKind, TypeName, Visibility};
use slir_ir::{ContractId, ExprId, FunctionId, Name, Span};
use slir_types::{Elementary, Idx, TypeData};

use super::expr::NameRef;
use super::{Lowerer, Value};
use crate::ir::{
    Builtin, CallTarget, Constant, InstrKind, LowLevelKind, Operand, RequireKind, StoreMode,
    VarId,
};

#[derive(Default)]
struct CallOptions {
    value: Option<Operand<VarId>>,
    gas: Option<Operand<VarId>>,
    salt: Option<Operand<VarId>>,
}

impl Lowerer<'_> {
    pub(super) fn lower_call(&mut self, callee: ExprId, args: &[ExprId], span: Span) -> Value {
        let arena = self.arena;
        let (callee, options) = match &arena.expr(callee).kind {
            ExprKind::CallOptions { callee, options } => (*callee, options.as_slice()),
            _ => (callee, &[][..]),
        };

        match &arena.expr(callee).kind {
            ExprKind::ElementaryType(ty) => {
                let to = self.resolve_ty(ty);
                self.lower_conversion(to, args, span)
            }
            ExprKind::New(ty) => self.lower_new(ty, args, options, span),
            ExprKind::Ident(name) => self.lower_named_call(*name, args, span),
            ExprKind::Member { base, member } => {
                self.lower_member_call(*base, *member, args, options, span)
            }
            _ => {
                let callee = self.lower_expr(callee);
                self.lower_indirect(callee, args, span)
            }
        }
    }

    fn lower_arg_values(&mut self, args: &[ExprId]) -> Vec<Value> {
        args.iter().map(|arg| self.lower_expr(*arg)).collect()
    }

    fn lower_options(&mut self, options: &[(Name, ExprId)]) -> CallOptions {
        let mut lowered = CallOptions::default();
        for (name, expr) in options {
            let value = self.lower_expr(*expr).op;
            match self.name(*name) {
                "value" => lowered.value = Some(value),
                "gas" => lowered.gas = Some(value),
                "salt" => lowered.salt = Some(value),
                _ => {}
            }
        }
        lowered
    }

    /// Result slot for a call returning `ty`; unit-returning calls get none.
    fn call_result(&mut self, ty: Idx) -> (Option<VarId>, Value) {
        if ty == Idx::UNIT {
            (None, Value::unit())
        } else {
            let dst = self.builder.temp(ty);
            (Some(dst), Value::var(dst, ty))
        }
    }

    /// Overload by argument count, then by exact parameter types, then the
    /// first candidate.
    fn pick_overload(&self, candidates: &[FunctionId], args: &[Idx]) -> Option<FunctionId> {
        let program = self.program;
        let same_arity: Vec<FunctionId> = candidates
            .iter()
            .copied()
            .filter(|f| program.function(*f).params.len() == args.len())
            .collect();
        match same_arity.as_slice() {
            [] => candidates.first().copied(),
            [only] => Some(*only),
            several => several
                .iter()
                .copied()
                .find(|f| {
                    let params = &program.function(*f).signature.params;
                    params
                        .iter()
                        .zip(args)
                        .all(|(p, a)| self.pool.canonical(*p) == self.pool.canonical(*a))
                })
                .or_else(|| several.first().copied()),
        }
    }

    fn lower_conversion(&mut self, to: Idx, args: &[ExprId], span: Span) -> Value {
        let [arg] = args else {
            return self.unsupported("type conversion with several arguments", span);
        };
        let value = self.lower_expr(*arg).op;
        let dst = self.builder.temp(to);
        self.emit(InstrKind::Convert { dst, value, to }, span);
        Value::var(dst, to)
    }

    fn lower_indirect(&mut self, callee: Value, args: &[ExprId], span: Span) -> Value {
        let args = self.lower_args(args);
        let ty = match self.pool.get(self.pool.canonical(callee.ty)) {
            TypeData::Function { returns, .. } if returns.is_empty() => Idx::UNIT,
            TypeData::Function { returns, .. } => self.pool.tuple(returns),
            _ => Idx::ERROR,
        };
        let (dst, result) = self.call_result(ty);
        self.emit(
            InstrKind::IndirectCall {
                dst,
                callee: callee.op,
                args,
            },
            span,
        );
        result
    }

    // Free-standing names

    fn lower_named_call(&mut self, name: Name, args: &[ExprId], span: Span) -> Value {
        if !matches!(self.resolve_name(name), NameRef::Unbound) {
            let callee = self.lower_ident(name, span);
            return self.lower_indirect(callee, args, span);
        }

        let text = self.name(name);
        match text {
            "require" => return self.lower_require(RequireKind::Require, args, span),
            "assert" => return self.lower_require(RequireKind::Assert, args, span),
            "revert" => {
                let args = self.lower_args(args);
                self.emit(InstrKind::Revert { error: None, args }, span);
                return Value::unit();
            }
            "payable" => return self.lower_conversion(Idx::ADDRESS_PAYABLE, args, span),
            _ => {}
        }

        if let Some(builtin) = Builtin::from_free(text) {
            let args = self.lower_args(args);
            let (dst, result) = self.call_result(builtin.result_ty(self.pool));
            self.emit(InstrKind::BuiltinCall { dst, builtin, args }, span);
            return result;
        }

        let program = self.program;
        let mut candidates = self
            .contract
            .map(|c| program.functions_named(c, name))
            .unwrap_or_default();
        if candidates.is_empty() {
            candidates = program.free_functions_named(name).to_vec();
        }
        if !candidates.is_empty() {
            let values = self.lower_arg_values(args);
            let tys: Vec<Idx> = values.iter().map(|v| v.ty).collect();
            if let Some(function) = self.pick_overload(&candidates, &tys) {
                let args = values.iter().map(|v| v.op).collect();
                return self.lower_internal_call(function, args, span);
            }
        }

        if self.is_event(name) {
            let args = self.lower_args(args);
            self.emit(InstrKind::Emit { event: name, args }, span);
            return Value::unit();
        }

        if let Some(ty) = program.type_named(self.contract, name) {
            return match self.pool.get(ty) {
                TypeData::Struct { .. } => {
                    let args = self.lower_args(args);
                    let dst = self.builder.temp(ty);
                    self.emit(InstrKind::Construct { dst, ty, args }, span);
                    Value::var(dst, ty)
                }
                _ => self.lower_conversion(ty, args, span),
            };
        }

        self.unsupported(format!("call to unresolved `{text}`"), span)
    }

    fn is_event(&self, name: Name) -> bool {
        self.contract
            .and_then(|c| self.program.contract(c).members.as_ref())
            .is_some_and(|members| !members.events_named(name).is_empty())
    }

    fn lower_require(&mut self, kind: RequireKind, args: &[ExprId], span: Span) -> Value {
        let Some((cond, rest)) = args.split_first() else {
            return self.unsupported("`require` without a condition", span);
        };
        let cond = self.lower_expr(*cond).op;
        let message = rest.first().map(|m| self.lower_expr(*m).op);
        self.emit(InstrKind::Require { cond, message, kind }, span);
        Value::unit()
    }

    /// Private, library and non-member functions bind statically; anything
    /// else goes through virtual dispatch.
    fn lower_internal_call(
        &mut self,
        function: FunctionId,
        args: Vec<Operand<VarId>>,
        span: Span,
    ) -> Value {
        let program = self.program;
        let f = program.function(function);
        let in_library = f.contract.is_some_and(|c| program.contract(c).is_library());
        let target = if f.visibility == Visibility::Private || in_library || !f.is_member() {
            CallTarget::Direct(function)
        } else {
            CallTarget::Virtual {
                signature: f.signature.clone(),
                declared: Some(function),
            }
        };
        let (dst, result) = self.call_result(self.returns_ty(function));
        self.emit(InstrKind::InternalCall { dst, target, args }, span);
        result
    }

    // `new`

    fn lower_new(
        &mut self,
        ty: &TypeName,
        args: &[ExprId],
        options: &[(Name, ExprId)],
        span: Span,
    ) -> Value {
        let resolved = self.resolve_ty(ty);
        let canonical = self.pool.canonical(resolved);
        let args = self.lower_args(args);
        let options = self.lower_options(options);

        if let Some((contract, _)) = self.pool.contract_of(canonical) {
            let dst = self.builder.temp(resolved);
            self.emit(
                InstrKind::NewContract {
                    dst,
                    contract,
                    args,
                    value: options.value,
                    salt: options.salt,
                },
                span,
            );
            return Value::var(dst, resolved);
        }

        let constructible = matches!(
            self.pool.get(canonical),
            TypeData::Array { .. } | TypeData::Elementary(Elementary::Bytes | Elementary::String)
        );
        if constructible {
            let dst = self.builder.temp(resolved);
            self.emit(
                InstrKind::Construct {
                    dst,
                    ty: resolved,
                    args,
                },
                span,
            );
            return Value::var(dst, resolved);
        }

        let spelled = self.program.display_type(resolved);
        self.unsupported(format!("`new {spelled}`"), span)
    }

    // Member calls

    fn lower_member_call(
        &mut self,
        base: ExprId,
        member: Name,
        args: &[ExprId],
        options: &[(Name, ExprId)],
        span: Span,
    ) -> Value {
        let arena = self.arena;
        if let ExprKind::Ident(base_name) = &arena.expr(base).kind {
            if self.is_namespace_base(base) {
                return self.lower_namespace_call(*base_name, member, args, span);
            }
        }

        let place = self.lower_place(base);
        let base_ty = match place {
            Some(place) => self.var_ty(Self::place_var(place)),
            None => Idx::ERROR,
        };
        let member_text = self.name(member);

        if let (Some(place), "push" | "pop") = (place, member_text) {
            if self.has_length(base_ty) {
                let value = args.first().map(|a| self.lower_expr(*a).op);
                let mode = if member_text == "push" {
                    StoreMode::Push
                } else {
                    StoreMode::Pop
                };
                self.write(place, value, mode, span);
                return Value::unit();
            }
        }

        let receiver = match place {
            Some(place) => self.read(place, span),
            None => self.lower_expr(base),
        };
        let canonical = self.pool.canonical(receiver.ty);

        if let Some(value) = self.lower_using_for_call(receiver, member, args, span) {
            return value;
        }

        if self.pool.is_address(canonical) {
            if let Some(kind) = LowLevelKind::from_member(member_text) {
                let args = self.lower_args(args);
                let options = self.lower_options(options);
                let (dst, result) = self.call_result(kind.result_ty(self.pool));
                self.emit(
                    InstrKind::LowLevelCall {
                        dst,
                        kind,
                        receiver: receiver.op,
                        args,
                        value: options.value,
                        gas: options.gas,
                    },
                    span,
                );
                return result;
            }
        }

        let values = self.lower_arg_values(args);
        let options = self.lower_options(options);
        let (function, ty) = match self.pool.contract_of(canonical) {
            Some((contract, _)) => self.external_target(contract, member, &values),
            None if self.pool.is_address(canonical) => {
                return self.unsupported(
                    format!("unknown builtin member `address.{member_text}`"),
                    span,
                );
            }
            None => (None, Idx::ERROR),
        };
        let (dst, result) = self.call_result(ty);
        self.emit(
            InstrKind::ExternalCall {
                dst,
                receiver: receiver.op,
                name: member,
                function,
                args: values.iter().map(|v| v.op).collect(),
                value: options.value,
                gas: options.gas,
            },
            span,
        );
        result
    }

    fn has_length(&self, ty: Idx) -> bool {
        matches!(
            self.pool.get(self.pool.canonical(ty)),
            TypeData::Array { .. } | TypeData::Elementary(Elementary::Bytes)
        )
    }

    /// Declaration and result type of `contract.member(args)`: a function
    /// or a public state variable getter.
    fn external_target(
        &self,
        contract: ContractId,
        member: Name,
        args: &[Value],
    ) -> (Option<FunctionId>, Idx) {
        let program = self.program;
        let candidates = program.functions_named(contract, member);
        let tys: Vec<Idx> = args.iter().map(|v| v.ty).collect();
        if let Some(function) = self.pick_overload(&candidates, &tys) {
            return (Some(function), self.returns_ty(function));
        }
        if let Some(var) = program.lookup_state_variable(contract, member) {
            let mut ty = program.variable(var).ty;
            for _ in args {
                ty = self
                    .pool
                    .index_result(self.pool.canonical(ty))
                    .unwrap_or(Idx::ERROR);
            }
            return (None, ty);
        }
        (None, Idx::ERROR)
    }

    /// `x.f(args)` where a `using L for T` directive attaches `L.f` to the
    /// type of `x`. The receiver becomes the first argument.
    fn lower_using_for_call(
        &mut self,
        receiver: Value,
        member: Name,
        args: &[ExprId],
        span: Span,
    ) -> Option<Value> {
        let program = self.program;
        let contract = self.contract?;
        let canonical = self.pool.canonical(receiver.ty);
        let (library, candidates) = program
            .libraries_for(contract, canonical)
            .into_iter()
            .map(|lib| (lib, program.functions_named(lib, member)))
            .find(|(_, candidates)| !candidates.is_empty())?;

        let mut values = vec![receiver];
        values.extend(self.lower_arg_values(args));
        let tys: Vec<Idx> = values.iter().map(|v| v.ty).collect();
        let function = self.pick_overload(&candidates, &tys);
        let ty = function.map_or(Idx::ERROR, |f| self.returns_ty(f));
        let (dst, result) = self.call_result(ty);
        self.emit(
            InstrKind::LibraryCall {
                dst,
                library,
                name: member,
                function,
                args: values.iter().map(|v| v.op).collect(),
            },
            span,
        );
        Some(result)
    }

    /// `super.f()`, `abi.encode(...)`, `Base.f()`, `Lib.f()`.
    fn lower_namespace_call(
        &mut self,
        base: Name,
        member: Name,
        args: &[ExprId],
        span: Span,
    ) -> Value {
        let (base_text, member_text) = (self.name(base), self.name(member));
        match base_text {
            "super" => return self.lower_super_call(member, args, span),
            "abi" => return self.lower_abi_call(member, args, span),
            _ => {}
        }
        if let Some(contract) = self.program.contract_named(base) {
            return self.lower_qualified_call(contract, member, args, span);
        }
        self.unsupported(format!("call to `{base_text}.{member_text}`"), span)
    }

    fn lower_super_call(&mut self, member: Name, args: &[ExprId], span: Span) -> Value {
        let program = self.program;
        let Some(contract) = self.contract else {
            return self.unsupported("`super` outside a contract", span);
        };
        let values = self.lower_arg_values(args);
        let tys: Vec<Idx> = values.iter().map(|v| v.ty).collect();
        let candidates: Vec<FunctionId> = program
            .contract(contract)
            .lin_or_self()
            .iter()
            .skip(1)
            .flat_map(|c| program.contract(*c).functions.iter().copied())
            .filter(|f| {
                let f = program.function(*f);
                f.name == member && f.is_member()
            })
            .collect();
        let Some(function) = self.pick_overload(&candidates, &tys) else {
            let text = self.name(member);
            return self.unsupported(format!("`super.{text}` has no base implementation"), span);
        };
        let target = CallTarget::Super {
            from: contract,
            signature: program.function(function).signature.clone(),
        };
        let (dst, result) = self.call_result(self.returns_ty(function));
        self.emit(
            InstrKind::InternalCall {
                dst,
                target,
                args: values.iter().map(|v| v.op).collect(),
            },
            span,
        );
        result
    }

    fn lower_abi_call(&mut self, member: Name, args: &[ExprId], span: Span) -> Value {
        let text = self.name(member);
        let Some(builtin) = Builtin::from_abi(text) else {
            return self.unsupported(format!("unknown builtin member `abi.{text}`"), span);
        };
        let values = self.lower_arg_values(args);
        let ty = match builtin {
            // The second argument is the type (or tuple of types) decoded to.
            Builtin::AbiDecode => values.get(1).map_or(Idx::ERROR, |v| match v.op {
                Operand::Const(Constant::Type(ty)) => ty,
                _ => v.ty,
            }),
            _ => builtin.result_ty(self.pool),
        };
        let (dst, result) = self.call_result(ty);
        self.emit(
            InstrKind::BuiltinCall {
                dst,
                builtin,
                args: values.iter().map(|v| v.op).collect(),
            },
            span,
        );
        result
    }

    /// `Lib.f(x)` is a library call; `Base.f(x)` from a descendant is a
    /// static call to the version `Base` sees.
    fn lower_qualified_call(
        &mut self,
        contract: ContractId,
        member: Name,
        args: &[ExprId],
        span: Span,
    ) -> Value {
        let program = self.program;
        let candidates = program.functions_named(contract, member);
        let values = self.lower_arg_values(args);
        let tys: Vec<Idx> = values.iter().map(|v| v.ty).collect();
        let function = self.pick_overload(&candidates, &tys);
        let args: Vec<Operand<VarId>> = values.iter().map(|v| v.op).collect();

        if program.contract(contract).is_library() {
            let ty = function.map_or(Idx::ERROR, |f| self.returns_ty(f));
            let (dst, result) = self.call_result(ty);
            self.emit(
                InstrKind::LibraryCall {
                    dst,
                    library: contract,
                    name: member,
                    function,
                    args,
                },
                span,
            );
            return result;
        }

        let inherited = self
            .contract
            .is_some_and(|c| program.inherits_from(c, contract));
        match function {
            Some(function) if inherited => {
                let (dst, result) = self.call_result(self.returns_ty(function));
                self.emit(
                    InstrKind::InternalCall {
                        dst,
                        target: CallTarget::Direct(function),
                        args,
                    },
                    span,
                );
                result
            }
            _ => {
                let (base_text, member_text) = (
                    self.name(program.contract(contract).name),
                    self.name(member),
                );
                self.unsupported(format!("call to `{base_text}.{member_text}`"), span)
            }
        }
    }
}
