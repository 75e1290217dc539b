//! SSA conversion.
//!
//! Rewrites a [`Cfg`] so every variable is defined exactly once:
//!
//! 1. Dominators (Cooper-Harvey-Kennedy) and dominance frontiers.
//! 2. Entry values of parameters, returns and state variables are
//!    materialized as `Input` instructions at the top of the entry block.
//! 3. Every variable with more than one static definition gets a phi in
//!    each block of the iterated dominance frontier of its definitions.
//! 4. Renaming walks the dominator tree (see `rename.rs`).
//!
//! A read with no reaching definition binds to the
//! [`UNDEFINED`](SsaVar::UNDEFINED) version and yields a
//! `MaybeUninitialized` diagnostic; conversion always completes.

mod rename;

use std::fmt;

use rustc_hash::FxHashMap;
use slir_diagnostic::Diagnostics;
use slir_ir::{FunctionId, Span, StringInterner};
use smallvec::SmallVec;
use tracing::debug;

use crate::cfg::{BlockKind, Cfg, Edge};
use crate::graph::{iterated_frontier, DominatorTree};
use crate::ir::{BlockId, Instr, InstrId, InstrKind, IrVar, Operand, VarId};

use self::rename::Renamer;

/// One version of an IR variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SsaVar {
    pub base: VarId,
    pub version: u32,
}

impl SsaVar {
    /// Version of a read with no reaching definition.
    pub const UNDEFINED: u32 = u32::MAX;

    pub const fn new(base: VarId, version: u32) -> Self {
        Self { base, version }
    }

    pub const fn undefined(base: VarId) -> Self {
        Self::new(base, Self::UNDEFINED)
    }

    pub const fn is_undefined(self) -> bool {
        self.version == Self::UNDEFINED
    }
}

impl fmt::Display for SsaVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            write!(f, "v{}_undef", self.base.raw())
        } else {
            write!(f, "v{}_{}", self.base.raw(), self.version)
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SsaBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub reachable: bool,
    /// `Phi` instructions, one per merged variable, ordered by variable.
    pub phis: Vec<Instr<SsaVar>>,
    pub instrs: Vec<Instr<SsaVar>>,
    pub succs: SmallVec<[Edge; 2]>,
    pub preds: SmallVec<[BlockId; 2]>,
}

impl SsaBlock {
    /// Phis first, then the body.
    pub fn all_instrs(&self) -> impl Iterator<Item = &Instr<SsaVar>> + '_ {
        self.phis.iter().chain(&self.instrs)
    }
}

/// A function in SSA form.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SsaFunction {
    pub function: FunctionId,
    pub vars: Vec<IrVar>,
    pub blocks: Vec<SsaBlock>,
    pub params: Vec<VarId>,
    pub returns: Vec<VarId>,
    pub partial: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub dominators: DominatorTree,
    /// Versions issued per base variable.
    versions: Vec<u32>,
    /// `Input` definition per base variable with an entry value.
    inputs: FxHashMap<VarId, SsaVar>,
}

impl SsaFunction {
    pub fn entry(&self) -> BlockId {
        Cfg::ENTRY
    }

    pub fn block(&self, id: BlockId) -> &SsaBlock {
        &self.blocks[id.index()]
    }

    pub fn var(&self, base: VarId) -> &IrVar {
        &self.vars[base.index()]
    }

    /// Every instruction with its block, phis first within each block.
    pub fn instrs(&self) -> impl Iterator<Item = (BlockId, &Instr<SsaVar>)> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.all_instrs().map(move |i| (b.id, i)))
    }

    pub fn phis(&self) -> impl Iterator<Item = (BlockId, &Instr<SsaVar>)> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.phis.iter().map(move |i| (b.id, i)))
    }

    pub fn version_count(&self, base: VarId) -> u32 {
        self.versions.get(base.index()).copied().unwrap_or(0)
    }

    /// The entry value of a parameter, return or state variable.
    pub fn input_of(&self, base: VarId) -> Option<SsaVar> {
        self.inputs.get(&base).copied()
    }

    pub fn inputs(&self) -> impl Iterator<Item = SsaVar> + '_ {
        self.blocks[Cfg::ENTRY.index()]
            .instrs
            .iter()
            .filter_map(|i| match i.kind {
                InstrKind::Input { dst } => Some(dst),
                _ => None,
            })
    }

    /// Operand lists of every reachable `Return`.
    pub fn returned_values(&self) -> impl Iterator<Item = &[Operand<SsaVar>]> + '_ {
        self.blocks
            .iter()
            .filter(|b| b.reachable)
            .flat_map(|b| b.instrs.iter())
            .filter_map(|i| match &i.kind {
                InstrKind::Return { values } => Some(values.as_slice()),
                _ => None,
            })
    }

    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dominators.dominates(a.index(), b.index())
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.dominators.idom(block.index()).map(BlockId::from_len)
    }
}

/// Convert `cfg` to SSA form. `interner` renders variable names for
/// diagnostics.
#[tracing::instrument(level = "debug", skip_all, fields(function = cfg.function.raw()))]
pub fn convert(cfg: &Cfg, interner: &StringInterner) -> (SsaFunction, Diagnostics) {
    let dominators = DominatorTree::build(cfg);
    let frontiers = dominators.frontiers(cfg);
    let mut next_id = cfg.next_instr_id();

    let mut bodies: Vec<Vec<Instr<VarId>>> = cfg.blocks.iter().map(|b| b.instrs.clone()).collect();
    let entry_inputs = entry_inputs(cfg, &mut next_id);
    if let Some(entry) = bodies.first_mut() {
        entry.splice(0..0, entry_inputs);
    }

    let phi_sites = place_phis(cfg, &bodies, &frontiers);
    let phi_count: usize = phi_sites.iter().map(Vec::len).sum();

    let mut renamer = Renamer::new(cfg, &dominators, &phi_sites, &mut next_id);
    renamer.run(bodies);
    let (blocks, versions, undefined) = renamer.finish();
    let diagnostics = rename::report_uninitialized(cfg, &blocks, undefined, interner);

    let inputs = blocks
        .first()
        .map(|entry| {
            entry
                .instrs
                .iter()
                .filter_map(|i| match i.kind {
                    InstrKind::Input { dst } => Some((dst.base, dst)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    debug!(
        blocks = blocks.len(),
        phis = phi_count,
        versions = versions.iter().map(|v| u64::from(*v)).sum::<u64>(),
        uninitialized = diagnostics.len(),
        "SSA conversion complete"
    );

    let ssa = SsaFunction {
        function: cfg.function,
        vars: cfg.vars.clone(),
        blocks,
        params: cfg.params.clone(),
        returns: cfg.returns.clone(),
        partial: cfg.partial,
        dominators,
        versions,
        inputs,
    };
    (ssa, diagnostics)
}

/// `Input` for each parameter, return and state variable, in that order.
fn entry_inputs(cfg: &Cfg, next_id: &mut u32) -> Vec<Instr<VarId>> {
    let state = cfg
        .vars
        .iter()
        .enumerate()
        .filter(|(_, v)| v.kind.is_state())
        .map(|(i, _)| VarId::from_len(i));
    let mut seen: Vec<VarId> = Vec::new();
    for var in cfg.params.iter().chain(&cfg.returns).copied().chain(state) {
        if !seen.contains(&var) {
            seen.push(var);
        }
    }
    seen.into_iter()
        .map(|dst| {
            let id = InstrId::new(*next_id);
            *next_id += 1;
            Instr {
                id,
                kind: InstrKind::Input { dst },
                span: Span::DUMMY,
            }
        })
        .collect()
}

/// Variables needing a phi, per block, each list sorted.
fn place_phis(cfg: &Cfg, bodies: &[Vec<Instr<VarId>>], frontiers: &[Vec<usize>]) -> Vec<Vec<VarId>> {
    let mut def_count: FxHashMap<VarId, usize> = FxHashMap::default();
    let mut def_blocks: FxHashMap<VarId, Vec<usize>> = FxHashMap::default();
    for (block, body) in bodies.iter().enumerate() {
        for instr in body {
            let Some(var) = instr.kind.result() else {
                continue;
            };
            *def_count.entry(var).or_default() += 1;
            if cfg.is_reachable(BlockId::from_len(block)) {
                let blocks = def_blocks.entry(var).or_default();
                if !blocks.contains(&block) {
                    blocks.push(block);
                }
            }
        }
    }

    let mut sites: Vec<Vec<VarId>> = vec![Vec::new(); bodies.len()];
    for (var, blocks) in def_blocks {
        if def_count.get(&var).copied().unwrap_or(0) < 2 {
            continue;
        }
        for join in iterated_frontier(frontiers, blocks) {
            if cfg.blocks[join].kind == BlockKind::Unwind {
                continue;
            }
            sites[join].push(var);
        }
    }
    for site in &mut sites {
        site.sort_unstable();
    }
    sites
}

#[cfg(test)]
mod tests;
