//! Inter-procedural data-dependency graph.
//!
//! An edge `a → b` means the value of `b` may depend on the value of `a`.
//!
//! - Inside a function: every operand of an instruction flows into its
//!   result, phi operands included.
//! - State: a new version of a state variable flows into that variable's
//!   global node, which flows into every function's entry value of it.
//! - Resolved internal calls: arguments flow into the callee's parameter
//!   entry values, returned values flow into the call's result.
//! - External, low-level and indirect calls, contract creation and calls
//!   without a resolved target go through a per-site call node. Its
//!   operands flow into the node; the node flows into the result and into
//!   every state variable visible to the caller's contracts, each of
//!   which flows back into the node.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use slir_ir::{ContractId, FunctionId, VariableId};
use slir_model::Program;
use tracing::debug;

use crate::callgraph::{CallGraph, CallKind};
use crate::ir::{InstrId, InstrKind, Operand, VarKind};
use crate::ssa::{SsaFunction, SsaVar};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DepNode {
    /// One SSA value of a function.
    Value(FunctionId, SsaVar),
    /// Global node of a state variable.
    State(VariableId),
    /// A conservatively modeled call site.
    Call(FunctionId, InstrId),
}

impl DepNode {
    pub fn function(self) -> Option<FunctionId> {
        match self {
            DepNode::Value(f, _) | DepNode::Call(f, _) => Some(f),
            DepNode::State(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DependencyGraph {
    nodes: Vec<DepNode>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: FxHashMap<DepNode, usize>,
    succs: Vec<Vec<usize>>,
    preds: Vec<Vec<usize>>,
    #[cfg_attr(feature = "serde", serde(skip))]
    owned: FxHashMap<FunctionId, Vec<usize>>,
}

impl DependencyGraph {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build<'a>(
        program: &Program,
        functions: impl IntoIterator<Item = &'a SsaFunction>,
        calls: &CallGraph,
    ) -> Self {
        let functions: Vec<&SsaFunction> = functions.into_iter().collect();
        let by_id: FxHashMap<FunctionId, &SsaFunction> =
            functions.iter().map(|f| (f.function, *f)).collect();
        let mut graph = Self::default();
        for ssa in &functions {
            graph.add_function(program, ssa, &by_id, calls);
        }

        debug!(
            functions = functions.len(),
            nodes = graph.nodes.len(),
            edges = graph.succs.iter().map(Vec::len).sum::<usize>(),
            "dependency graph complete"
        );
        graph
    }

    fn add_function(
        &mut self,
        program: &Program,
        ssa: &SsaFunction,
        by_id: &FxHashMap<FunctionId, &SsaFunction>,
        calls: &CallGraph,
    ) {
        let f = ssa.function;
        let value = |var: SsaVar| DepNode::Value(f, var);
        let visible = visible_state(program, f);

        for (_, instr) in ssa.instrs() {
            if let Some(dst) = instr.kind.result() {
                self.intern(value(dst));
                if let Some(v) = state_of(ssa, dst) {
                    match instr.kind {
                        InstrKind::Input { .. } => self.edge(DepNode::State(v), value(dst)),
                        InstrKind::Phi { .. } => {}
                        _ => self.edge(value(dst), DepNode::State(v)),
                    }
                }
            }

            if !instr.kind.is_call() || matches!(instr.kind, InstrKind::BuiltinCall { .. }) {
                if let Some(dst) = instr.kind.result() {
                    for used in defined_uses(&instr.kind) {
                        self.edge(value(used), value(dst));
                    }
                }
                continue;
            }

            let resolved: Vec<&SsaFunction> = calls
                .edges_at(f, instr.id)
                .filter(|e| matches!(e.kind, CallKind::Internal | CallKind::VirtualResolved))
                .filter_map(|e| e.callee.and_then(|c| by_id.get(&c).copied()))
                .collect();
            let conservative = match instr.kind {
                InstrKind::InternalCall { .. } | InstrKind::LibraryCall { .. } => resolved.is_empty(),
                _ => true,
            };

            if conservative {
                let node = DepNode::Call(f, instr.id);
                self.intern(node);
                for used in defined_uses(&instr.kind) {
                    self.edge(value(used), node);
                }
                if let Some(dst) = instr.kind.result() {
                    self.edge(node, value(dst));
                }
                for v in &visible {
                    self.edge(node, DepNode::State(*v));
                    self.edge(DepNode::State(*v), node);
                }
                continue;
            }

            let args = call_args(&instr.kind);
            for callee in resolved {
                let g = callee.function;
                for (arg, param) in args.iter().zip(&callee.params) {
                    let (Some(arg), Some(input)) = (arg.as_var(), callee.input_of(*param)) else {
                        continue;
                    };
                    if !arg.is_undefined() {
                        self.edge(value(arg), DepNode::Value(g, input));
                    }
                }
                if let Some(dst) = instr.kind.result() {
                    for returned in callee.returned_values() {
                        for var in returned.iter().filter_map(Operand::as_var) {
                            if !var.is_undefined() {
                                self.edge(DepNode::Value(g, var), value(dst));
                            }
                        }
                    }
                }
            }
        }
    }

    fn intern(&mut self, node: DepNode) -> usize {
        if let Some(i) = self.index.get(&node) {
            return *i;
        }
        let i = self.nodes.len();
        self.nodes.push(node);
        self.succs.push(Vec::new());
        self.preds.push(Vec::new());
        self.index.insert(node, i);
        if let Some(f) = node.function() {
            self.owned.entry(f).or_default().push(i);
        }
        i
    }

    fn edge(&mut self, from: DepNode, to: DepNode) {
        let (a, b) = (self.intern(from), self.intern(to));
        if !self.succs[a].contains(&b) {
            self.succs[a].push(b);
            self.preds[b].push(a);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: DepNode) -> bool {
        self.index.contains_key(&node)
    }

    pub fn successors(&self, node: DepNode) -> Vec<DepNode> {
        self.neighbours(node, &self.succs)
    }

    pub fn predecessors(&self, node: DepNode) -> Vec<DepNode> {
        self.neighbours(node, &self.preds)
    }

    fn neighbours(&self, node: DepNode, adjacency: &[Vec<usize>]) -> Vec<DepNode> {
        let mut out: Vec<DepNode> = self
            .index
            .get(&node)
            .map(|i| adjacency[*i].iter().map(|j| self.nodes[*j]).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Every node reachable from `node` along dependency edges, sorted.
    /// `node` itself is included only when it lies on a cycle.
    pub fn forward(&self, node: DepNode) -> Vec<DepNode> {
        self.reach([node], &self.succs)
    }

    /// Every node `node` depends on, sorted.
    pub fn backward(&self, node: DepNode) -> Vec<DepNode> {
        self.reach([node], &self.preds)
    }

    /// State variables reached forward from any value or call node of
    /// `function`, sorted.
    pub fn function_state_influence(&self, function: FunctionId) -> Vec<VariableId> {
        let starts: Vec<DepNode> = self
            .owned
            .get(&function)
            .map(|owned| owned.iter().map(|i| self.nodes[*i]).collect())
            .unwrap_or_default();
        self.reach(starts, &self.succs)
            .into_iter()
            .filter_map(|n| match n {
                DepNode::State(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    fn reach(&self, starts: impl IntoIterator<Item = DepNode>, adjacency: &[Vec<usize>]) -> Vec<DepNode> {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut queue: VecDeque<usize> = VecDeque::new();
        for start in starts {
            if let Some(i) = self.index.get(&start) {
                queue.extend(adjacency[*i].iter().copied());
            }
        }
        while let Some(i) = queue.pop_front() {
            if seen.insert(i) {
                queue.extend(adjacency[i].iter().copied());
            }
        }
        let mut reached: Vec<DepNode> = seen.into_iter().map(|i| self.nodes[i]).collect();
        reached.sort_unstable();
        reached
    }
}

/// Uses with a reaching definition; undefined versions carry no value.
fn defined_uses(kind: &InstrKind<SsaVar>) -> impl Iterator<Item = SsaVar> {
    kind.uses().into_iter().filter(|v| !v.is_undefined())
}

fn call_args(kind: &InstrKind<SsaVar>) -> &[Operand<SsaVar>] {
    match kind {
        InstrKind::InternalCall { args, .. } | InstrKind::LibraryCall { args, .. } => args,
        _ => &[],
    }
}

fn state_of(ssa: &SsaFunction, var: SsaVar) -> Option<VariableId> {
    match ssa.var(var.base).kind {
        VarKind::State(v) => Some(v),
        _ => None,
    }
}

/// State variables visible in any contract the function can run in.
fn visible_state(program: &Program, function: FunctionId) -> Vec<VariableId> {
    let mut contexts: Vec<ContractId> = program.contexts_of(function);
    if contexts.is_empty() {
        contexts.extend(program.function(function).contract);
    }
    let mut visible: Vec<VariableId> = contexts
        .into_iter()
        .flat_map(|c| program.visible_state_variables(c))
        .collect();
    visible.sort_unstable();
    visible.dedup();
    visible
}

#[cfg(test)]
mod tests;
