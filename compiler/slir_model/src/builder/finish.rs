//! Resolution passes run by [`ProgramBuilder::finish`].

use rustc_hash::{FxHashMap, FxHashSet};
use slir_diagnostic::{AnalysisError, Diagnostics, EntityKey, LinearizationFailure};
use slir_ir::ast::{ContractKind, FunctionKind, TypeName};
use slir_ir::{ContractId, FunctionId, StringInterner, VariableId};
use slir_types::{Idx, Pool, TypeResolver};
use tracing::debug;

use super::{PendingContract, PendingFunction, PendingVariable, ProgramBuilder};
use crate::linearize::{BaseRef, LinearizeError, Linearizer};
use crate::members::{build_member_table, Declared, MemberKey};
use crate::program::Program;
use crate::scope::ScopeView;
use crate::{
    Contract, ContractFlags, Event, Function, FunctionFlags, Signature, UserType, UsingFor,
    Variable, VariableFlags, VariableOwner,
};

impl ProgramBuilder {
    /// Linearize, resolve types, compute signatures and member tables, then
    /// freeze. Failures become diagnostics; the program is always produced.
    #[tracing::instrument(level = "debug", skip_all, fields(
        contracts = self.contracts.len(),
        functions = self.functions.len(),
        variables = self.variables.len(),
    ))]
    pub fn finish(self) -> (Program, Diagnostics) {
        let ProgramBuilder {
            interner,
            order,
            units,
            contracts,
            functions,
            variables,
            type_index,
        } = self;
        let mut diagnostics = Diagnostics::new();
        let pool = Pool::new();
        let decl_of = |pending: &PendingContract| &units[pending.unit.index()].contracts[pending.index];

        // Pass 1: linearize
        let bases: Vec<Vec<BaseRef>> = contracts
            .iter()
            .map(|pending| {
                decl_of(pending)
                    .bases
                    .iter()
                    .map(|base| match type_index.contract_named(base.name) {
                        Some(id) => BaseRef::Known(id),
                        None => BaseRef::Unknown(base.name),
                    })
                    .collect()
            })
            .collect();
        let mut linearizations: Vec<Option<Vec<ContractId>>> = Vec::with_capacity(contracts.len());
        for (raw, result) in Linearizer::new(&bases, order).run().into_iter().enumerate() {
            let id = ContractId::from_len(raw);
            match result {
                Ok(lin) => linearizations.push(Some(lin)),
                Err(err) => {
                    let decl = decl_of(&contracts[raw]);
                    diagnostics.push(
                        EntityKey::Contract(id),
                        AnalysisError::Linearization {
                            contract: interner.lookup(decl.name).to_string(),
                            failure: render_failure(&err, &contracts, &units, &interner),
                            span: decl.span,
                        },
                    );
                    linearizations.push(None);
                }
            }
        }
        debug!("linearization pass complete");

        // Pass 2: resolve every annotation in its contract's scope
        let view = ScopeView::new(&type_index, &units, &linearizations);
        let context_of = |owner: VariableOwner| match owner {
            VariableOwner::Contract(c) => Some(c),
            VariableOwner::Function(f) => functions[f.index()].contract,
        };

        let mut poisoned_functions: FxHashSet<FunctionId> = FxHashSet::default();
        let frozen_variables: Vec<Variable> = variables
            .into_iter()
            .enumerate()
            .map(|(raw, pending)| {
                let id = VariableId::from_len(raw);
                let PendingVariable {
                    decl,
                    scope,
                    owner,
                    unit,
                } = pending;
                let mut flags = VariableFlags::empty();
                flags.set(VariableFlags::CONSTANT, decl.is_constant);
                flags.set(VariableFlags::IMMUTABLE, decl.is_immutable);

                let mut resolver =
                    TypeResolver::new(&pool, &interner, &view).in_contract(context_of(owner));
                let ty = match resolver.resolve(&decl.ty) {
                    Ok(ty) => ty,
                    Err(err) => {
                        flags |= VariableFlags::TYPE_ERROR;
                        let key = match owner {
                            VariableOwner::Contract(_) => EntityKey::Variable(id),
                            VariableOwner::Function(f) => {
                                poisoned_functions.insert(f);
                                EntityKey::Function(f)
                            }
                        };
                        diagnostics.push(key, err.into_analysis(decl.span));
                        Idx::ERROR
                    }
                };

                Variable {
                    id,
                    name: decl.name,
                    ty,
                    location: decl.location,
                    scope,
                    owner,
                    flags,
                    initializer: decl.initializer,
                    unit,
                    span: decl.span,
                }
            })
            .collect();

        let resolve_quiet = |context: Option<ContractId>, ty: &TypeName| {
            TypeResolver::new(&pool, &interner, &view)
                .in_contract(context)
                .resolve(ty)
        };

        // Pass 3: signatures
        let fallback = interner.intern("fallback");
        let receive = interner.intern("receive");
        let signatures: Vec<Signature> = functions
            .iter()
            .map(|pending| {
                let name = match pending.decl.kind {
                    FunctionKind::Fallback => fallback,
                    FunctionKind::Receive => receive,
                    _ => pending.decl.name,
                };
                let params = pending
                    .params
                    .iter()
                    .map(|p| frozen_variables[p.index()].ty)
                    .collect();
                Signature::new(name, params)
            })
            .collect();

        // Contract-level declarations: events, user types, using-for
        let mut frozen_contracts: Vec<Contract> = Vec::with_capacity(contracts.len());
        let mut declared: Vec<Declared> = Vec::with_capacity(contracts.len());
        for (raw, pending) in contracts.iter().enumerate() {
            let id = ContractId::from_len(raw);
            let decl = decl_of(pending);

            let events = decl
                .events
                .iter()
                .map(|event| {
                    let params = event
                        .params
                        .iter()
                        .map(|p| match resolve_quiet(Some(id), &p.ty) {
                            Ok(ty) => ty,
                            Err(err) => {
                                diagnostics.push(EntityKey::Program, err.into_analysis(p.span));
                                Idx::ERROR
                            }
                        })
                        .collect();
                    Event {
                        name: event.name,
                        signature: Signature::new(event.name, params),
                        anonymous: event.anonymous,
                        span: event.span,
                    }
                })
                .collect::<Vec<_>>();

            let types: Vec<UserType> = decl
                .structs
                .iter()
                .map(|s| s.name)
                .chain(decl.enums.iter().map(|e| e.name))
                .map(|name| UserType {
                    name,
                    qualified: type_index.qualified(Some(id), name).unwrap_or(name),
                    ty: resolve_quiet(Some(id), &TypeName::UserDefined(vec![name]))
                        .unwrap_or(Idx::ERROR),
                })
                .collect();

            let using_for = decl
                .using_for
                .iter()
                .filter_map(|directive| {
                    let library = type_index.contract_named(directive.library)?;
                    let target = match &directive.target {
                        Some(ty) => Some(resolve_quiet(Some(id), ty).ok()?),
                        None => None,
                    };
                    Some(UsingFor { library, target })
                })
                .collect();

            let base_args = decl
                .bases
                .iter()
                .filter(|base| !base.args.is_empty())
                .filter_map(|base| {
                    Some((type_index.contract_named(base.name)?, base.args.clone()))
                })
                .collect();

            let mut flags = ContractFlags::empty();
            flags.set(ContractFlags::INTERFACE, decl.kind == ContractKind::Interface);
            flags.set(ContractFlags::LIBRARY, decl.kind == ContractKind::Library);
            flags.set(ContractFlags::ABSTRACT, decl.is_abstract);
            flags.set(ContractFlags::LINEARIZATION_FAILED, linearizations[raw].is_none());

            declared.push(Declared {
                functions: pending
                    .functions
                    .iter()
                    .filter(|f| is_member_kind(functions[f.index()].decl.kind))
                    .map(|f| {
                        (
                            signatures[f.index()].clone(),
                            *f,
                            functions[f.index()].decl.body.is_some(),
                        )
                    })
                    .collect(),
                events: events.iter().map(|e| e.signature.clone()).collect(),
                modifiers: pending
                    .modifiers
                    .iter()
                    .map(|m| {
                        let pending = &functions[m.index()];
                        (pending.decl.name, *m, pending.decl.body.is_some())
                    })
                    .collect(),
                state_variables: pending
                    .state_variables
                    .iter()
                    .map(|v| (frozen_variables[v.index()].name, *v))
                    .collect(),
                types: types.iter().map(|t| t.name).collect(),
            });

            frozen_contracts.push(Contract {
                id,
                name: decl.name,
                kind: decl.kind,
                flags,
                unit: pending.unit,
                span: decl.span,
                documentation: decl.documentation.clone(),
                bases: bases[raw]
                    .iter()
                    .filter_map(|b| match b {
                        BaseRef::Known(id) => Some(*id),
                        BaseRef::Unknown(_) => None,
                    })
                    .collect(),
                base_args,
                linearization: linearizations[raw].clone(),
                state_variables: pending.state_variables.clone(),
                functions: pending.functions.clone(),
                modifiers: pending.modifiers.clone(),
                events,
                types,
                using_for,
                members: None,
                initializer: pending.initializer,
            });
        }

        // File-level user types
        let free_types: Vec<UserType> = units
            .iter()
            .flat_map(|unit| {
                unit.structs
                    .iter()
                    .map(|s| s.name)
                    .chain(unit.enums.iter().map(|e| e.name))
            })
            .map(|name| UserType {
                name,
                qualified: name,
                ty: resolve_quiet(None, &TypeName::UserDefined(vec![name])).unwrap_or(Idx::ERROR),
            })
            .collect();
        debug!(types = pool.len(), "type resolution pass complete");

        // Pass 4: member tables
        for contract in &mut frozen_contracts {
            let Some(lin) = &linearizations[contract.id.index()] else {
                continue;
            };
            let (table, conflicts) = build_member_table(lin, &linearizations, &declared);
            for conflict in conflicts {
                contract.flags |= ContractFlags::CONFLICT;
                let member = render_key(&conflict.key, &pool, &interner);
                let candidates = conflict
                    .candidates
                    .iter()
                    .map(|c| interner.lookup(decl_of(&contracts[c.index()]).name).to_string())
                    .collect();
                diagnostics.push(
                    EntityKey::Contract(contract.id),
                    AnalysisError::InheritanceConflict {
                        contract: interner.lookup(contract.name).to_string(),
                        member,
                        candidates,
                        span: contract.span,
                    },
                );
            }
            contract.members = Some(table);
        }
        debug!("member tables complete");

        // Pass 5: freeze
        let interface_ids: FxHashSet<ContractId> = frozen_contracts
            .iter()
            .filter(|c| c.is_interface())
            .map(|c| c.id)
            .collect();
        let frozen_functions: Vec<Function> = functions
            .into_iter()
            .zip(signatures)
            .enumerate()
            .map(|(raw, (pending, signature))| {
                let id = FunctionId::from_len(raw);
                freeze_function(id, pending, signature, &poisoned_functions, &interface_ids)
            })
            .collect();

        let mut free_functions: FxHashMap<_, Vec<FunctionId>> = FxHashMap::default();
        for function in frozen_functions.iter().filter(|f| f.contract.is_none()) {
            free_functions.entry(function.name).or_default().push(function.id);
        }

        diagnostics.sort();
        debug!(
            contracts = frozen_contracts.len(),
            functions = frozen_functions.len(),
            diagnostics = diagnostics.len(),
            "program frozen"
        );

        let program = Program {
            units,
            contracts: frozen_contracts,
            functions: frozen_functions,
            variables: frozen_variables,
            free_types,
            free_functions,
            declared,
            linearizations,
            type_index,
            pool,
            interner,
        };
        (program, diagnostics)
    }
}

fn is_member_kind(kind: FunctionKind) -> bool {
    matches!(
        kind,
        FunctionKind::Function | FunctionKind::Fallback | FunctionKind::Receive
    )
}

fn freeze_function(
    id: FunctionId,
    pending: PendingFunction,
    signature: Signature,
    poisoned: &FxHashSet<FunctionId>,
    interfaces: &FxHashSet<ContractId>,
) -> Function {
    let PendingFunction {
        decl,
        contract,
        unit,
        params,
        returns,
        locals,
        local_decls,
        synthetic,
    } = pending;

    let mut flags = FunctionFlags::empty();
    flags.set(
        FunctionFlags::VIRTUAL,
        decl.is_virtual || contract.is_some_and(|c| interfaces.contains(&c)),
    );
    flags.set(FunctionFlags::OVERRIDE, decl.is_override);
    flags.set(FunctionFlags::IMPLEMENTED, decl.body.is_some() || synthetic);
    flags.set(FunctionFlags::TYPE_ERROR, poisoned.contains(&id));
    flags.set(FunctionFlags::SYNTHETIC, synthetic);

    Function {
        id,
        name: decl.name,
        contract,
        kind: decl.kind,
        visibility: decl.visibility,
        mutability: decl.mutability,
        flags,
        params,
        returns,
        locals,
        local_decls,
        modifiers: decl.modifiers,
        body: decl.body,
        unit,
        signature,
        span: decl.span,
        documentation: decl.documentation,
    }
}

fn render_failure(
    err: &LinearizeError,
    contracts: &[PendingContract],
    units: &[slir_ir::ast::SourceUnit],
    interner: &StringInterner,
) -> LinearizationFailure {
    let name_of = |id: ContractId| {
        let pending = &contracts[id.index()];
        interner
            .lookup(units[pending.unit.index()].contracts[pending.index].name)
            .to_string()
    };
    match err {
        LinearizeError::Inconsistent { remaining } => LinearizationFailure::Inconsistent {
            remaining: remaining.iter().map(|c| name_of(*c)).collect(),
        },
        LinearizeError::Cycle { through } => LinearizationFailure::Cycle {
            through: name_of(*through),
        },
        LinearizeError::UnknownBase(name) => LinearizationFailure::UnknownBase {
            base: interner.lookup(*name).to_string(),
        },
        LinearizeError::BaseFailed(base) => LinearizationFailure::BaseFailed {
            base: name_of(*base),
        },
    }
}

fn render_key(key: &MemberKey, pool: &Pool, interner: &StringInterner) -> String {
    match key {
        MemberKey::Function(sig) => sig.display(pool, interner),
        MemberKey::Event(sig) => format!("event {}", sig.display(pool, interner)),
        MemberKey::Modifier(name) => format!("modifier {}", interner.lookup(*name)),
        MemberKey::StateVariable(name) | MemberKey::Type(name) => {
            interner.lookup(*name).to_string()
        }
    }
}
