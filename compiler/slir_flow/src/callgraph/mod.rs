//! Whole-program call graph.
//!
//! Nodes are functions, keyed by owning contract and signature. Each call
//! instruction contributes edges:
//!
//! | call | kind | callee |
//! |------|------|--------|
//! | `Direct`, library call | `Internal` | the bound declaration |
//! | `Virtual`, `Super`, modifier | `VirtualResolved` | resolved per most-derived contract |
//! | external call, `new C(...)` | `External` | declaration on the static type / constructor |
//! | low-level, indirect, failed dispatch | `Unresolved` | none |
//!
//! Dispatch-dependent calls get one edge per context the caller can run
//! in: every contract whose resolved function set contains the caller.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use slir_ir::{ContractId, FunctionId};
use slir_model::{Program, Signature};
use tracing::debug;

use crate::ir::{CallTarget, InstrId, InstrKind};
use crate::ssa::{SsaFunction, SsaVar};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CallKind {
    Internal,
    External,
    VirtualResolved,
    Unresolved,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CallEdge {
    pub caller: FunctionId,
    pub site: InstrId,
    /// Most-derived contract the dispatch was resolved in. `None` when
    /// the target does not depend on it.
    pub context: Option<ContractId>,
    pub callee: Option<FunctionId>,
    pub kind: CallKind,
}

/// Node key: owning contract (`None` for free functions) and signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionKey {
    pub contract: Option<ContractId>,
    pub signature: Signature,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CallGraph {
    nodes: BTreeMap<FunctionKey, FunctionId>,
    edges: Vec<CallEdge>,
    by_caller: FxHashMap<FunctionId, Vec<usize>>,
    by_callee: FxHashMap<FunctionId, Vec<usize>>,
    by_site: FxHashMap<(FunctionId, InstrId), Vec<usize>>,
}

impl CallGraph {
    /// Build the graph from every analyzed function.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build<'a>(program: &Program, functions: impl IntoIterator<Item = &'a SsaFunction>) -> Self {
        let mut graph = Self::default();
        for f in program.functions() {
            graph.nodes.insert(
                FunctionKey {
                    contract: f.contract,
                    signature: f.signature.clone(),
                },
                f.id,
            );
        }

        let mut functions_seen = 0usize;
        for ssa in functions {
            functions_seen += 1;
            let mut contexts = program.contexts_of(ssa.function);
            if contexts.is_empty() {
                contexts.extend(program.function(ssa.function).contract);
            }
            for (_, instr) in ssa.instrs() {
                for (context, callee, kind) in resolve(program, &contexts, &instr.kind) {
                    graph.push(CallEdge {
                        caller: ssa.function,
                        site: instr.id,
                        context,
                        callee,
                        kind,
                    });
                }
            }
        }

        debug!(
            functions = functions_seen,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "call graph complete"
        );
        graph
    }

    fn push(&mut self, edge: CallEdge) {
        let index = self.edges.len();
        self.by_caller.entry(edge.caller).or_default().push(index);
        if let Some(callee) = edge.callee {
            self.by_callee.entry(callee).or_default().push(index);
        }
        self.by_site
            .entry((edge.caller, edge.site))
            .or_default()
            .push(index);
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    /// The function declared in `contract` (or free, for `None`) with
    /// `signature`.
    pub fn node(&self, contract: Option<ContractId>, signature: &Signature) -> Option<FunctionId> {
        self.nodes
            .get(&FunctionKey {
                contract,
                signature: signature.clone(),
            })
            .copied()
    }

    pub fn calls_from(&self, caller: FunctionId) -> impl Iterator<Item = &CallEdge> + '_ {
        self.indexed(self.by_caller.get(&caller))
    }

    pub fn edges_at(&self, caller: FunctionId, site: InstrId) -> impl Iterator<Item = &CallEdge> + '_ {
        self.indexed(self.by_site.get(&(caller, site)))
    }

    /// Union of the callees a call site reaches over every context of the
    /// caller, sorted.
    pub fn targets_at(&self, caller: FunctionId, site: InstrId) -> Vec<FunctionId> {
        let mut targets: Vec<FunctionId> = self
            .edges_at(caller, site)
            .filter_map(|e| e.callee)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Functions with at least one edge into `callee`, sorted.
    pub fn callers_of(&self, callee: FunctionId) -> Vec<FunctionId> {
        let mut callers: Vec<FunctionId> = self
            .indexed(self.by_callee.get(&callee))
            .map(|e| e.caller)
            .collect();
        callers.sort_unstable();
        callers.dedup();
        callers
    }

    fn indexed<'s>(&'s self, indices: Option<&'s Vec<usize>>) -> impl Iterator<Item = &'s CallEdge> + 's {
        indices
            .into_iter()
            .flatten()
            .map(move |i| &self.edges[*i])
    }
}

type Resolved = (Option<ContractId>, Option<FunctionId>, CallKind);

/// Edges for one instruction; empty for non-calls and builtins.
fn resolve(program: &Program, contexts: &[ContractId], kind: &InstrKind<SsaVar>) -> Vec<Resolved> {
    let fixed = |callee: Option<FunctionId>, call: CallKind| {
        let call = if callee.is_none() && call == CallKind::Internal {
            CallKind::Unresolved
        } else {
            call
        };
        vec![(None, callee, call)]
    };
    let dispatched = |lookup: &dyn Fn(ContractId) -> Option<FunctionId>| -> Vec<Resolved> {
        if contexts.is_empty() {
            return vec![(None, None, CallKind::Unresolved)];
        }
        contexts
            .iter()
            .map(|ctx| match lookup(*ctx) {
                Some(callee) => (Some(*ctx), Some(callee), CallKind::VirtualResolved),
                None => (Some(*ctx), None, CallKind::Unresolved),
            })
            .collect()
    };

    match kind {
        InstrKind::InternalCall { target, .. } => match target {
            CallTarget::Direct(callee) => fixed(Some(*callee), CallKind::Internal),
            CallTarget::Virtual { signature, .. } => {
                dispatched(&|ctx| program.resolve_function(ctx, signature))
            }
            CallTarget::Super { from, signature } => {
                dispatched(&|ctx| program.resolve_super(ctx, *from, signature))
            }
            CallTarget::Modifier { name, .. } => {
                dispatched(&|ctx| program.lookup_modifier(ctx, *name))
            }
        },
        InstrKind::LibraryCall { function, .. } => fixed(*function, CallKind::Internal),
        InstrKind::ExternalCall { function, .. } => fixed(*function, CallKind::External),
        InstrKind::NewContract { contract, .. } => {
            fixed(program.constructor(*contract), CallKind::External)
        }
        InstrKind::LowLevelCall { .. } | InstrKind::IndirectCall { .. } => {
            fixed(None, CallKind::Unresolved)
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests;
