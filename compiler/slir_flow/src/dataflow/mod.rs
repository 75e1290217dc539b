//! Def-use index over one SSA function.
//!
//! Every SSA variable maps to its single defining site and to the sites
//! reading it (phis included). Per base variable the index also keeps
//! read and write sets, from which the state variables a function reads
//! and writes are derived. Entry `Input`s and phis are bookkeeping and
//! count as neither reads nor writes of the base variable.

use rustc_hash::FxHashMap;
use slir_ir::{FunctionId, VariableId};
use smallvec::SmallVec;
use tracing::trace;

use crate::ir::{BlockId, InstrId, InstrKind, VarId};
use crate::ssa::{SsaFunction, SsaVar};

/// Where an instruction sits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Site {
    pub block: BlockId,
    pub instr: InstrId,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DefUseIndex {
    pub function: Option<FunctionId>,
    defs: FxHashMap<SsaVar, Site>,
    uses: FxHashMap<SsaVar, Vec<Site>>,
    reads: FxHashMap<VarId, Vec<Site>>,
    writes: FxHashMap<VarId, Vec<Site>>,
    state_read: Vec<VariableId>,
    state_written: Vec<VariableId>,
}

impl DefUseIndex {
    pub fn build(ssa: &SsaFunction) -> Self {
        let mut index = Self {
            function: Some(ssa.function),
            ..Self::default()
        };

        for (block, instr) in ssa.instrs() {
            let site = Site {
                block,
                instr: instr.id,
            };
            let bookkeeping = matches!(
                instr.kind,
                InstrKind::Phi { .. } | InstrKind::Input { .. }
            );

            if let Some(dst) = instr.kind.result() {
                index.defs.insert(dst, site);
                if !bookkeeping {
                    index.writes.entry(dst.base).or_default().push(site);
                }
            }

            let mut used: SmallVec<[SsaVar; 4]> = instr.kind.uses();
            used.sort_unstable();
            used.dedup();
            for var in &used {
                index.uses.entry(*var).or_default().push(site);
            }

            if bookkeeping {
                continue;
            }
            let mut read: SmallVec<[VarId; 4]> = base_reads(&instr.kind);
            read.sort_unstable();
            read.dedup();
            for base in read {
                index.reads.entry(base).or_default().push(site);
            }
        }

        index.state_read = state_variables(ssa, index.reads.keys());
        index.state_written = state_variables(ssa, index.writes.keys());

        trace!(
            function = ssa.function.raw(),
            defs = index.defs.len(),
            state_read = index.state_read.len(),
            state_written = index.state_written.len(),
            "def-use index built"
        );
        index
    }

    /// The one instruction defining `var`; `None` for undefined versions.
    pub fn definition(&self, var: SsaVar) -> Option<Site> {
        self.defs.get(&var).copied()
    }

    /// Instructions reading `var`, each once, in block order.
    pub fn uses(&self, var: SsaVar) -> &[Site] {
        self.uses.get(&var).map_or(&[], Vec::as_slice)
    }

    /// Every SSA variable with a definition.
    pub fn defined(&self) -> impl Iterator<Item = SsaVar> + '_ {
        self.defs.keys().copied()
    }

    /// Instructions reading any version of `base`.
    pub fn reads_of(&self, base: VarId) -> &[Site] {
        self.reads.get(&base).map_or(&[], Vec::as_slice)
    }

    /// Instructions defining a new version of `base`.
    pub fn writes_of(&self, base: VarId) -> &[Site] {
        self.writes.get(&base).map_or(&[], Vec::as_slice)
    }

    /// State variables the function reads, sorted.
    pub fn state_read(&self) -> &[VariableId] {
        &self.state_read
    }

    /// State variables the function writes, directly or through a
    /// storage pointer, sorted.
    pub fn state_written(&self) -> &[VariableId] {
        &self.state_written
    }
}

/// Bases an instruction reads. A store's `prior` operand only threads the
/// previous version into the new one and is not a read.
fn base_reads(kind: &InstrKind<SsaVar>) -> SmallVec<[VarId; 4]> {
    let prior = match kind {
        InstrKind::Store { prior, .. } => Some(*prior),
        _ => None,
    };
    let mut skipped = false;
    kind.uses()
        .into_iter()
        .filter(|v| {
            if !skipped && Some(*v) == prior {
                skipped = true;
                return false;
            }
            true
        })
        .map(|v| v.base)
        .collect()
}

fn state_variables<'a>(ssa: &SsaFunction, bases: impl Iterator<Item = &'a VarId>) -> Vec<VariableId> {
    let mut state: Vec<VariableId> = bases
        .filter_map(|base| {
            let kind = ssa.var(*base).kind;
            kind.is_state().then(|| kind.variable()).flatten()
        })
        .collect();
    state.sort_unstable();
    state.dedup();
    state
}

#[cfg(test)]
mod tests;
