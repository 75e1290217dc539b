//! The frozen program and its queries.

use rustc_hash::FxHashMap;
use slir_ir::ast::{SourceUnit, TypeName, Visibility};
use slir_ir::{ContractId, FunctionId, Name, SharedInterner, StringInterner, UnitId, VariableId};
use slir_types::{Idx, Pool, TypeError, TypeResolver};

use crate::members::Declared;
use crate::scope::{ScopeView, TypeIndex};
use crate::{Contract, Function, Signature, UserType, Variable, VariableFlags};

/// Every entity of an analyzed program, immutable after
/// [`ProgramBuilder::finish`](crate::ProgramBuilder::finish).
///
/// Shared read-only by every function task. The type pool stays
/// append-only, so tasks may still intern new array and tuple types.
pub struct Program {
    pub(crate) units: Vec<SourceUnit>,
    pub(crate) contracts: Vec<Contract>,
    pub(crate) functions: Vec<Function>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) free_types: Vec<UserType>,
    pub(crate) free_functions: FxHashMap<Name, Vec<FunctionId>>,
    pub(crate) declared: Vec<Declared>,
    pub(crate) linearizations: Vec<Option<Vec<ContractId>>>,
    pub(crate) type_index: TypeIndex,
    pub(crate) pool: Pool,
    pub(crate) interner: SharedInterner,
}

impl Program {
    // Entities

    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> &SourceUnit {
        &self.units[id.index()]
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn contract(&self, id: ContractId) -> &Contract {
        &self.contracts[id.index()]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn shared_interner(&self) -> SharedInterner {
        SharedInterner::clone(&self.interner)
    }

    /// Text of an interned name.
    pub fn name(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    pub fn contract_named(&self, name: Name) -> Option<ContractId> {
        self.type_index.contract_named(name)
    }

    pub fn free_functions_named(&self, name: Name) -> &[FunctionId] {
        self.free_functions.get(&name).map_or(&[], Vec::as_slice)
    }

    pub fn free_types(&self) -> &[UserType] {
        &self.free_types
    }

    // Inheritance

    /// True if `ancestor` appears in `of`'s linearization (including `of`).
    pub fn inherits_from(&self, of: ContractId, ancestor: ContractId) -> bool {
        self.contract(of).lin_or_self().contains(&ancestor)
    }

    /// Virtual dispatch: the declaration `signature` resolves to when the
    /// most-derived contract is `contract`.
    pub fn resolve_function(&self, contract: ContractId, signature: &Signature) -> Option<FunctionId> {
        self.contract(contract).members.as_ref()?.function(signature)
    }

    /// The implementation a `super.f(...)` call in a function of `from`
    /// reaches, when the most-derived contract is `contract`.
    pub fn resolve_super(
        &self,
        contract: ContractId,
        from: ContractId,
        signature: &Signature,
    ) -> Option<FunctionId> {
        let lin = self.contract(contract).linearization.as_ref()?;
        let start = lin.iter().position(|c| *c == from)? + 1;
        lin[start..].iter().find_map(|c| {
            let (id, implemented) = self.declared[c.index()].function(signature)?;
            implemented.then_some(id)
        })
    }

    /// Resolved overloads called `name` visible in `contract`.
    pub fn functions_named(&self, contract: ContractId, name: Name) -> Vec<FunctionId> {
        match &self.contract(contract).members {
            Some(members) => members.functions_named(name).to_vec(),
            None => self
                .contract(contract)
                .functions
                .iter()
                .copied()
                .filter(|f| self.function(*f).name == name && self.function(*f).is_member())
                .collect(),
        }
    }

    pub fn lookup_state_variable(&self, contract: ContractId, name: Name) -> Option<VariableId> {
        match &self.contract(contract).members {
            Some(members) => members.state_variable(name),
            None => self
                .contract(contract)
                .state_variables
                .iter()
                .copied()
                .find(|v| self.variable(*v).name == name),
        }
    }

    pub fn lookup_modifier(&self, contract: ContractId, name: Name) -> Option<FunctionId> {
        self.contract(contract).members.as_ref()?.modifier(name)
    }

    /// Storage layout order: most-base contract first, declaration order
    /// within each contract. Constants and immutables take no slot.
    pub fn state_variables_in_storage_order(&self, contract: ContractId) -> Vec<VariableId> {
        self.contract(contract)
            .lin_or_self()
            .iter()
            .rev()
            .flat_map(|c| self.contract(*c).state_variables.iter().copied())
            .filter(|v| {
                !self
                    .variable(*v)
                    .flags
                    .intersects(VariableFlags::CONSTANT | VariableFlags::IMMUTABLE)
            })
            .collect()
    }

    /// Every state variable visible in `contract`, including constants.
    pub fn visible_state_variables(&self, contract: ContractId) -> Vec<VariableId> {
        self.contract(contract)
            .lin_or_self()
            .iter()
            .rev()
            .flat_map(|c| self.contract(*c).state_variables.iter().copied())
            .collect()
    }

    /// Constructor declared directly in `contract`.
    pub fn constructor(&self, contract: ContractId) -> Option<FunctionId> {
        self.contract(contract)
            .functions
            .iter()
            .copied()
            .find(|f| self.function(*f).is_constructor())
    }

    /// Contracts whose resolved function set contains `function`: every
    /// most-derived context the function can run in. Empty for free and
    /// private functions, which are never dispatch targets.
    pub fn contexts_of(&self, function: FunctionId) -> Vec<ContractId> {
        let f = self.function(function);
        let Some(owner) = f.contract else {
            return Vec::new();
        };
        if f.visibility == Visibility::Private {
            return Vec::new();
        }
        if !f.is_member() {
            // constructors, modifiers and initializers run in every descendant
            return self
                .contracts
                .iter()
                .filter(|c| c.lin_or_self().contains(&owner))
                .map(|c| c.id)
                .collect();
        }
        self.contracts
            .iter()
            .filter(|c| match &c.members {
                Some(members) => members.function(&f.signature) == Some(function),
                None => c.id == owner,
            })
            .map(|c| c.id)
            .collect()
    }

    /// Libraries attached to `ty` by `using ... for` in `contract` or its bases.
    pub fn libraries_for(&self, contract: ContractId, ty: Idx) -> Vec<ContractId> {
        let mut libraries = Vec::new();
        for c in self.contract(contract).lin_or_self() {
            for directive in &self.contract(*c).using_for {
                let applies = match directive.target {
                    None => true,
                    Some(target) => target == ty || self.pool.canonical(target) == ty,
                };
                if applies && !libraries.contains(&directive.library) {
                    libraries.push(directive.library);
                }
            }
        }
        libraries
    }

    // Types

    /// Resolve an annotation as seen from inside `contract`.
    pub fn resolve_type(&self, contract: Option<ContractId>, ty: &TypeName) -> Result<Idx, TypeError> {
        let view = ScopeView::new(&self.type_index, &self.units, &self.linearizations);
        TypeResolver::new(&self.pool, &self.interner, &view)
            .in_contract(contract)
            .resolve(ty)
    }

    /// A user-defined type or contract named `name`, as seen from `contract`.
    pub fn type_named(&self, contract: Option<ContractId>, name: Name) -> Option<Idx> {
        self.resolve_type(contract, &TypeName::UserDefined(vec![name])).ok()
    }

    pub fn display_type(&self, ty: Idx) -> String {
        self.pool.display(ty, &self.interner)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("units", &self.units.len())
            .field("contracts", &self.contracts.len())
            .field("functions", &self.functions.len())
            .field("variables", &self.variables.len())
            .finish_non_exhaustive()
    }
}
