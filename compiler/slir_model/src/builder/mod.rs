//! Two-phase construction of the [`Program`](crate::Program).
//!
//! `add_unit` collects declarations and hands out ids in declaration order.
//! Nothing is resolved yet: variables keep their written [`TypeName`]s.
//! `finish` linearizes, resolves, builds member tables and freezes.

mod finish;

use rustc_hash::FxHashMap;
use slir_ir::ast::{
    AstArena, ContractDecl, FunctionDecl, FunctionKind, SourceUnit, StmtKind, VarDecl,
};
use slir_ir::{
    ensure_sufficient_stack, ContractId, FunctionId, SharedInterner, StmtId, UnitId, VariableId,
};
use tracing::trace;

use crate::linearize::InheritanceOrder;
use crate::scope::TypeIndex;
use crate::{VariableOwner, VariableScope};

/// Name given to the synthesized state-variable initializer.
pub const INITIALIZER_NAME: &str = "<initializer>";

struct PendingContract {
    unit: UnitId,
    /// Index within the unit's contract list.
    index: usize,
    state_variables: Vec<VariableId>,
    functions: Vec<FunctionId>,
    modifiers: Vec<FunctionId>,
    initializer: Option<FunctionId>,
}

struct PendingFunction {
    decl: FunctionDecl,
    contract: Option<ContractId>,
    unit: UnitId,
    params: Vec<VariableId>,
    returns: Vec<VariableId>,
    locals: Vec<VariableId>,
    local_decls: FxHashMap<(StmtId, u32), VariableId>,
    synthetic: bool,
}

struct PendingVariable {
    decl: VarDecl,
    scope: VariableScope,
    owner: VariableOwner,
    unit: UnitId,
}

pub struct ProgramBuilder {
    interner: SharedInterner,
    order: InheritanceOrder,
    units: Vec<SourceUnit>,
    contracts: Vec<PendingContract>,
    functions: Vec<PendingFunction>,
    variables: Vec<PendingVariable>,
    type_index: TypeIndex,
}

impl ProgramBuilder {
    pub fn new(interner: SharedInterner) -> Self {
        Self {
            interner,
            order: InheritanceOrder::default(),
            units: Vec::new(),
            contracts: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            type_index: TypeIndex::default(),
        }
    }

    #[must_use]
    pub fn with_inheritance_order(mut self, order: InheritanceOrder) -> Self {
        self.order = order;
        self
    }

    /// Collect every declaration of `unit`.
    #[tracing::instrument(level = "debug", skip_all, fields(contracts = unit.contracts.len()))]
    pub fn add_unit(&mut self, unit: SourceUnit) -> UnitId {
        let unit_id = UnitId::from_len(self.units.len());
        let first_contract = ContractId::from_len(self.contracts.len());
        self.type_index
            .add_unit(unit_id, &unit, first_contract, &self.interner);

        let named_constructors = unit
            .compiler_version
            .is_some_and(|v| v.has_named_constructors());

        for (index, contract) in unit.contracts.iter().enumerate() {
            self.collect_contract(unit_id, index, contract, &unit.arena, named_constructors);
        }
        for decl in &unit.functions {
            self.collect_function(decl, None, unit_id, &unit.arena, false);
        }

        self.units.push(unit);
        unit_id
    }

    fn collect_contract(
        &mut self,
        unit: UnitId,
        index: usize,
        decl: &ContractDecl,
        arena: &AstArena,
        named_constructors: bool,
    ) {
        let id = ContractId::from_len(self.contracts.len());
        trace!(contract = self.interner.lookup(decl.name), "collecting contract");
        self.contracts.push(PendingContract {
            unit,
            index,
            state_variables: Vec::new(),
            functions: Vec::new(),
            modifiers: Vec::new(),
            initializer: None,
        });

        let state_variables = decl
            .state_vars
            .iter()
            .map(|var| {
                self.push_variable(
                    var.clone(),
                    VariableScope::State,
                    VariableOwner::Contract(id),
                    unit,
                )
            })
            .collect();

        let functions = decl
            .functions
            .iter()
            .map(|function| {
                let legacy_ctor = named_constructors
                    && function.kind == FunctionKind::Function
                    && function.name == decl.name;
                self.collect_function(function, Some(id), unit, arena, legacy_ctor)
            })
            .collect();

        let modifiers = decl
            .modifiers
            .iter()
            .map(|modifier| self.collect_function(modifier, Some(id), unit, arena, false))
            .collect();

        let needs_initializer = decl
            .state_vars
            .iter()
            .any(|var| var.initializer.is_some() && !var.is_constant);
        let initializer = needs_initializer.then(|| self.synthesize_initializer(id, unit, decl));

        let pending = &mut self.contracts[id.index()];
        pending.state_variables = state_variables;
        pending.functions = functions;
        pending.modifiers = modifiers;
        pending.initializer = initializer;
    }

    fn synthesize_initializer(
        &mut self,
        contract: ContractId,
        unit: UnitId,
        decl: &ContractDecl,
    ) -> FunctionId {
        let id = FunctionId::from_len(self.functions.len());
        let mut function = FunctionDecl::new(
            self.interner.intern(INITIALIZER_NAME),
            FunctionKind::StateInitializer,
        );
        function.visibility = slir_ir::ast::Visibility::Internal;
        function.span = decl.span;
        self.functions.push(PendingFunction {
            decl: function,
            contract: Some(contract),
            unit,
            params: Vec::new(),
            returns: Vec::new(),
            locals: Vec::new(),
            local_decls: FxHashMap::default(),
            synthetic: true,
        });
        id
    }

    fn collect_function(
        &mut self,
        decl: &FunctionDecl,
        contract: Option<ContractId>,
        unit: UnitId,
        arena: &AstArena,
        legacy_ctor: bool,
    ) -> FunctionId {
        let id = FunctionId::from_len(self.functions.len());
        let owner = VariableOwner::Function(id);

        let mut decl = decl.clone();
        if legacy_ctor {
            decl.kind = FunctionKind::Constructor;
        }

        let params = decl
            .params
            .iter()
            .map(|p| self.push_variable(p.clone(), VariableScope::Parameter, owner, unit))
            .collect();
        let returns = decl
            .returns
            .iter()
            .map(|r| self.push_variable(r.clone(), VariableScope::Return, owner, unit))
            .collect();

        let mut found = Vec::new();
        if let Some(body) = decl.body {
            collect_locals(arena, body, &mut found);
        }
        let mut locals = Vec::with_capacity(found.len());
        let mut local_decls = FxHashMap::default();
        for (stmt, position, var) in found {
            let var_id = self.push_variable(var, VariableScope::Local, owner, unit);
            locals.push(var_id);
            local_decls.insert((stmt, position), var_id);
        }

        self.functions.push(PendingFunction {
            decl,
            contract,
            unit,
            params,
            returns,
            locals,
            local_decls,
            synthetic: false,
        });
        id
    }

    fn push_variable(
        &mut self,
        decl: VarDecl,
        scope: VariableScope,
        owner: VariableOwner,
        unit: UnitId,
    ) -> VariableId {
        let id = VariableId::from_len(self.variables.len());
        self.variables.push(PendingVariable {
            decl,
            scope,
            owner,
            unit,
        });
        id
    }
}

/// Every variable declared under `stmt`, with its declaring statement and
/// tuple position, in source order.
fn collect_locals(arena: &AstArena, stmt: StmtId, out: &mut Vec<(StmtId, u32, VarDecl)>) {
    ensure_sufficient_stack(|| match &arena.stmt(stmt).kind {
        StmtKind::Block(stmts) | StmtKind::Unchecked(stmts) => {
            for s in stmts {
                collect_locals(arena, *s, out);
            }
        }
        StmtKind::VarDecl { decls, .. } => {
            for (position, decl) in decls.iter().enumerate() {
                if let Some(decl) = decl {
                    let position = u32::try_from(position).unwrap_or(u32::MAX);
                    out.push((stmt, position, decl.clone()));
                }
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_locals(arena, *then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_locals(arena, *else_branch, out);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            collect_locals(arena, *body, out);
        }
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_locals(arena, *init, out);
            }
            collect_locals(arena, *body, out);
        }
        StmtKind::Expr(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_)
        | StmtKind::Emit { .. }
        | StmtKind::Revert { .. }
        | StmtKind::Throw
        | StmtKind::Placeholder
        | StmtKind::InlineAssembly
        | StmtKind::Try
        | StmtKind::Opaque(_) => {}
    });
}
