//! AST → three-operand IR lowering.
//!
//! Walks one function's statement tree and produces a flat instruction
//! sequence. Structured control flow becomes labels, jumps and branches;
//! the CFG builder later cuts the sequence into blocks.
//!
//! # Entry Point
//!
//! [`lower_function`] takes a frozen [`Program`] and a function id and
//! returns the [`LoweredFunction`] plus diagnostics scoped to that
//! function. Functions are independent: lowering never mutates the program,
//! so any number of functions lower in parallel.
//!
//! # Architecture
//!
//! - [`IrBuilder`]: owns variables and the instruction sequence, allocates
//!   temporaries and labels.
//! - `Lowerer`: walks statements (`control_flow.rs`), expressions
//!   (`expr.rs`) and calls (`calls.rs`).
//! - [`LocalScope`] (in `scope.rs`): name → variable bindings with block
//!   or function scoping.

mod calls;
mod control_flow;
mod expr;
pub(crate) mod scope;

use rustc_hash::FxHashMap;
use slir_diagnostic::{AnalysisError, Diagnostics, EntityKey};
use slir_ir::ast::{AstArena, FunctionKind};
use slir_ir::{ContractId, ExprId, FunctionId, Name, Span, VariableId};
use slir_model::{Function, Program, VariableScope};
use slir_types::{Idx, Pool};
use tracing::debug;

use crate::ir::{
    CallTarget, Constant, Instr, InstrId, InstrKind, IrVar, LabelId, LoweredFunction, Operand,
    StoreMode, VarId, VarKind,
};

pub use self::scope::LocalScope;

// ── Options ─────────────────────────────────────────────────────────

/// How local declarations are scoped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Scoping {
    /// Function scoping for units compiled before 0.5.0, block scoping
    /// otherwise (and when the version is unknown).
    #[default]
    Auto,
    Block,
    Function,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct LowerOptions {
    pub scoping: Scoping,
}

// ── IrBuilder ───────────────────────────────────────────────────────

/// Builder for an in-progress instruction sequence.
///
/// Consumed by [`finish`](IrBuilder::finish). Instruction ids are handed
/// out in emission order, so they are unique and dense within a function.
pub struct IrBuilder {
    vars: Vec<IrVar>,
    instrs: Vec<Instr<VarId>>,
    next_label: u32,
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IrBuilder {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            instrs: Vec::new(),
            next_label: 0,
        }
    }

    // Variables

    pub fn add_var(&mut self, var: IrVar) -> VarId {
        let id = VarId::from_len(self.vars.len());
        self.vars.push(var);
        id
    }

    pub fn temp(&mut self, ty: Idx) -> VarId {
        self.add_var(IrVar {
            kind: VarKind::Temp,
            name: Name::EMPTY,
            ty,
            root: None,
        })
    }

    /// A reference temporary; `root: None` makes it its own root.
    pub fn reference(&mut self, ty: Idx, root: Option<VarId>) -> VarId {
        let id = VarId::from_len(self.vars.len());
        self.add_var(IrVar {
            kind: VarKind::Reference,
            name: Name::EMPTY,
            ty,
            root: Some(root.unwrap_or(id)),
        })
    }

    pub fn var(&self, id: VarId) -> &IrVar {
        &self.vars[id.index()]
    }

    pub fn set_ty(&mut self, id: VarId, ty: Idx) {
        self.vars[id.index()].ty = ty;
    }

    pub fn set_root(&mut self, id: VarId, root: VarId) {
        self.vars[id.index()].root = Some(root);
    }

    // Labels and instructions

    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId::new(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn emit(&mut self, kind: InstrKind<VarId>, span: Span) -> InstrId {
        let id = InstrId::from_len(self.instrs.len());
        self.instrs.push(Instr { id, kind, span });
        id
    }

    pub fn place_label(&mut self, label: LabelId, span: Span) {
        self.emit(InstrKind::Label(label), span);
    }

    /// The last instruction never falls through.
    pub fn is_terminated(&self) -> bool {
        self.instrs.last().is_some_and(|i| i.kind.is_terminator())
    }

    pub fn finish(self) -> (Vec<IrVar>, Vec<Instr<VarId>>) {
        (self.vars, self.instrs)
    }
}

// ── Lowerer ─────────────────────────────────────────────────────────

/// A lowered expression: an atomic operand and its type.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Value {
    pub op: Operand<VarId>,
    pub ty: Idx,
}

impl Value {
    fn var(var: VarId, ty: Idx) -> Self {
        Self {
            op: Operand::Var(var),
            ty,
        }
    }

    fn unit() -> Self {
        Self {
            op: Operand::Const(Constant::Zero(Idx::UNIT)),
            ty: Idx::UNIT,
        }
    }
}

/// Somewhere a value can be written.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Place {
    /// Local, parameter or return slot: assigned directly.
    Local(VarId),
    /// State variable: written with a whole-value store.
    State(VarId),
    /// Access path: written through a store into `root`.
    Path { reference: VarId, root: VarId },
}

#[derive(Copy, Clone)]
struct LoopTargets {
    break_label: LabelId,
    continue_label: LabelId,
}

pub(crate) struct Lowerer<'a> {
    program: &'a Program,
    function: &'a Function,
    arena: &'a AstArena,
    pool: &'a Pool,
    contract: Option<ContractId>,
    builder: IrBuilder,
    scope: LocalScope,
    block_scoped: bool,
    /// IR slot of every model variable referenced so far.
    slots: FxHashMap<VariableId, VarId>,
    loops: Vec<LoopTargets>,
    diagnostics: Diagnostics,
    partial: bool,
}

impl<'a> Lowerer<'a> {
    fn new(program: &'a Program, function: &'a Function, options: &LowerOptions) -> Self {
        let unit = program.unit(function.unit);
        let block_scoped = match options.scoping {
            Scoping::Block => true,
            Scoping::Function => false,
            Scoping::Auto => !unit
                .compiler_version
                .is_some_and(|v| v.has_function_scoping()),
        };
        Self {
            program,
            function,
            arena: &unit.arena,
            pool: program.pool(),
            contract: function.contract,
            builder: IrBuilder::new(),
            scope: LocalScope::new(),
            block_scoped,
            slots: FxHashMap::default(),
            loops: Vec::new(),
            diagnostics: Diagnostics::new(),
            partial: false,
        }
    }

    fn name(&self, name: Name) -> &'static str {
        self.program.name(name)
    }

    fn intern(&self, text: &str) -> Name {
        self.program.interner().intern(text)
    }

    fn var_ty(&self, var: VarId) -> Idx {
        self.builder.var(var).ty
    }

    fn emit(&mut self, kind: InstrKind<VarId>, span: Span) -> InstrId {
        self.builder.emit(kind, span)
    }

    /// IR slot for a model variable, created on first reference.
    fn slot(&mut self, variable: VariableId) -> VarId {
        if let Some(slot) = self.slots.get(&variable) {
            return *slot;
        }
        let v = self.program.variable(variable);
        let kind = match v.scope {
            VariableScope::State => VarKind::State(variable),
            VariableScope::Parameter => VarKind::Param(variable),
            VariableScope::Return => VarKind::Return(variable),
            VariableScope::Local => VarKind::Local(variable),
        };
        let slot = self.builder.add_var(IrVar {
            kind,
            name: v.name,
            ty: v.ty,
            root: None,
        });
        self.slots.insert(variable, slot);
        slot
    }

    /// Record an unsupported construct and stand an `Opaque` in for it.
    fn unsupported(&mut self, construct: impl Into<String>, span: Span) -> Value {
        self.report_unsupported(construct.into(), span);
        let dst = self.builder.temp(Idx::ERROR);
        self.emit(InstrKind::Opaque { dst: Some(dst) }, span);
        Value::var(dst, Idx::ERROR)
    }

    fn report_unsupported(&mut self, construct: String, span: Span) {
        debug!(function = self.function.id.raw(), %construct, "unsupported construct");
        self.diagnostics.push(
            EntityKey::Function(self.function.id),
            AnalysisError::UnsupportedConstruct { construct, span },
        );
        self.partial = true;
    }

    // Places

    /// Where writes through `place` land.
    fn root_of(&self, place: Place) -> VarId {
        match place {
            Place::Local(var) => self.builder.var(var).root.unwrap_or(var),
            Place::State(var) => var,
            Place::Path { root, .. } => root,
        }
    }

    /// The variable naming the place itself, for use as an access-path base.
    fn place_var(place: Place) -> VarId {
        match place {
            Place::Local(var) | Place::State(var) => var,
            Place::Path { reference, .. } => reference,
        }
    }

    fn read(&mut self, place: Place, span: Span) -> Value {
        match place {
            Place::Local(var) => Value::var(var, self.var_ty(var)),
            Place::State(src) | Place::Path { reference: src, .. } => {
                let ty = self.var_ty(src);
                let dst = self.builder.temp(ty);
                self.emit(InstrKind::Load { dst, src }, span);
                Value::var(dst, ty)
            }
        }
    }

    fn write(&mut self, place: Place, value: Option<Operand<VarId>>, mode: StoreMode, span: Span) {
        match place {
            Place::Local(var) if self.builder.var(var).root.is_none() => match (mode, value) {
                (StoreMode::Assign, Some(value)) => {
                    self.emit(InstrKind::Assign { dst: var, value }, span);
                }
                (StoreMode::Delete, _) => {
                    let zero = Operand::Const(Constant::Zero(self.var_ty(var)));
                    self.emit(InstrKind::Assign { dst: var, value: zero }, span);
                }
                _ => {
                    self.emit(
                        InstrKind::Store {
                            root: var,
                            prior: var,
                            target: None,
                            value,
                            mode,
                        },
                        span,
                    );
                }
            },
            Place::Local(var) if mode == StoreMode::Assign => {
                // Rebinding a storage pointer changes the pointer, not the root.
                if let Some(value) = value {
                    self.emit(InstrKind::Assign { dst: var, value }, span);
                }
            }
            Place::Local(_) | Place::State(_) | Place::Path { .. } => {
                let root = self.root_of(place);
                let target = match place {
                    Place::Path { reference, .. } => Some(reference),
                    Place::Local(var) => Some(var),
                    Place::State(_) => None,
                };
                self.emit(
                    InstrKind::Store {
                        root,
                        prior: root,
                        target,
                        value,
                        mode,
                    },
                    span,
                );
            }
        }
    }

    // Prologue

    fn bind_signature(&mut self) {
        let (program, function) = (self.program, self.function);
        for id in function.params.iter().chain(&function.returns) {
            let slot = self.slot(*id);
            let name = program.variable(*id).name;
            if !name.is_empty() {
                self.scope.bind(name, slot);
            }
        }
        for id in &function.locals {
            let slot = self.slot(*id);
            if !self.block_scoped {
                self.scope.bind(program.variable(*id).name, slot);
            }
        }
    }

    /// Base constructors (most base first), then modifiers, as written.
    ///
    /// Base constructors are called only from an explicit constructor. The
    /// synthetic state initializer is a separate entry point; no constructor
    /// calls it.
    fn lower_entry_calls(&mut self) {
        let (program, function) = (self.program, self.function);
        let Some(contract) = self.contract else {
            return;
        };

        let mut header_args: FxHashMap<ContractId, &[ExprId]> = FxHashMap::default();
        for (base, args) in &program.contract(contract).base_args {
            header_args.insert(*base, args);
        }
        let mut modifiers = Vec::new();
        for invocation in &function.modifiers {
            match program.contract_named(invocation.name) {
                Some(base) if function.is_constructor() => {
                    header_args.insert(base, &invocation.args);
                }
                _ => modifiers.push(invocation),
            }
        }

        if function.is_constructor() {
            let lin = program.contract(contract).lin_or_self();
            for base in lin.iter().skip(1).rev() {
                let Some(ctor) = program.constructor(*base) else {
                    continue;
                };
                let args = header_args.get(base).copied().unwrap_or(&[]);
                let args = self.lower_args(args);
                self.emit(
                    InstrKind::InternalCall {
                        dst: None,
                        target: CallTarget::Direct(ctor),
                        args,
                    },
                    function.span,
                );
            }
        }

        for invocation in modifiers {
            let args = self.lower_args(&invocation.args);
            let declared = program.lookup_modifier(contract, invocation.name);
            self.emit(
                InstrKind::InternalCall {
                    dst: None,
                    target: CallTarget::Modifier {
                        name: invocation.name,
                        declared,
                    },
                    args,
                },
                invocation.span,
            );
        }
    }

    fn lower_args(&mut self, args: &[ExprId]) -> Vec<Operand<VarId>> {
        args.iter().map(|arg| self.lower_expr(*arg).op).collect()
    }

    /// Body of the synthetic initializer: evaluate and store each
    /// non-constant state initializer in declaration order.
    fn lower_state_initializers(&mut self) {
        let program = self.program;
        let Some(contract) = self.contract else {
            return;
        };
        for id in &program.contract(contract).state_variables {
            let variable = program.variable(*id);
            let Some(init) = variable.initializer else {
                continue;
            };
            if variable.is_constant() {
                continue;
            }
            let value = self.lower_expr(init);
            let slot = self.slot(*id);
            self.write(
                Place::State(slot),
                Some(value.op),
                StoreMode::Assign,
                variable.span,
            );
        }
    }

    fn finish(mut self) -> (LoweredFunction, Diagnostics) {
        if !self.builder.is_terminated() {
            let values = self.return_operands();
            self.emit(InstrKind::Return { values }, self.function.span);
        }
        let function = self.function;
        let params = function.params.iter().map(|p| self.slot(*p)).collect();
        let returns = function.returns.iter().map(|r| self.slot(*r)).collect();
        let (vars, instrs) = self.builder.finish();
        let lowered = LoweredFunction {
            function: self.function.id,
            vars,
            instrs,
            params,
            returns,
            partial: self.partial,
        };
        (lowered, self.diagnostics)
    }

    fn return_operands(&mut self) -> Vec<Operand<VarId>> {
        let function = self.function;
        function
            .returns
            .iter()
            .map(|r| Operand::Var(self.slot(*r)))
            .collect()
    }
}

// ── Public entry point ──────────────────────────────────────────────

/// Whether `function` has code to lower: a body, or synthesized
/// initializers.
pub fn has_code(function: &Function) -> bool {
    function.body.is_some() || function.kind == FunctionKind::StateInitializer
}

/// Lower one function (or modifier, constructor, initializer) to IR.
///
/// Unsupported constructs do not stop lowering: each becomes an `Opaque`
/// instruction plus an `UnsupportedConstruct` diagnostic, and the result
/// is marked partial.
#[tracing::instrument(level = "debug", skip_all, fields(function = function.raw()))]
pub fn lower_function(
    program: &Program,
    function: FunctionId,
    options: &LowerOptions,
) -> (LoweredFunction, Diagnostics) {
    let f = program.function(function);
    let mut lowerer = Lowerer::new(program, f, options);
    lowerer.bind_signature();
    lowerer.lower_entry_calls();

    if f.kind == FunctionKind::StateInitializer {
        lowerer.lower_state_initializers();
    } else if let Some(body) = f.body {
        lowerer.lower_stmt(body);
    }

    let (lowered, diagnostics) = lowerer.finish();
    debug!(
        instrs = lowered.instrs.len(),
        vars = lowered.vars.len(),
        partial = lowered.partial,
        "lowering complete"
    );
    (lowered, diagnostics)
}
