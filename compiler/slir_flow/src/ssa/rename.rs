//! Variable renaming over the dominator tree.
//!
//! Each base variable has a stack of live versions. Entering a block
//! pushes a fresh version for every phi and definition; leaving it pops
//! them again. Reads resolve to the top of the stack. After a block is
//! renamed, the phis of each successor receive the version live at the
//! end of the block, one operand per predecessor.
//!
//! Reachable blocks are renamed in dominator-tree preorder. Unreachable
//! blocks follow, each on its own with empty stacks.

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use slir_diagnostic::{AnalysisError, Diagnostics, EntityKey};
use slir_ir::{Span, StringInterner};

use super::{SsaBlock, SsaVar};
use crate::cfg::Cfg;
use crate::graph::DominatorTree;
use crate::ir::{Access, BlockId, Instr, InstrId, InstrKind, VarId};

struct PendingPhi {
    id: InstrId,
    base: VarId,
    dst: SsaVar,
    incoming: Vec<(BlockId, SsaVar)>,
}

enum Step {
    Enter(usize),
    Exit(Vec<VarId>),
}

/// A read of the undefined version inside a reachable block.
pub(super) struct UndefinedUse {
    pub var: VarId,
    pub span: Span,
}

pub(super) struct Renamer<'a> {
    cfg: &'a Cfg,
    dominators: &'a DominatorTree,
    counters: Vec<u32>,
    stacks: Vec<Vec<u32>>,
    phis: Vec<Vec<PendingPhi>>,
    renamed: Vec<Vec<Instr<SsaVar>>>,
    undefined: Vec<UndefinedUse>,
}

impl<'a> Renamer<'a> {
    pub(super) fn new(
        cfg: &'a Cfg,
        dominators: &'a DominatorTree,
        phi_sites: &[Vec<VarId>],
        next_id: &mut u32,
    ) -> Self {
        let phis = phi_sites
            .iter()
            .map(|site| {
                site.iter()
                    .map(|base| {
                        let id = InstrId::new(*next_id);
                        *next_id += 1;
                        PendingPhi {
                            id,
                            base: *base,
                            dst: SsaVar::undefined(*base),
                            incoming: Vec::new(),
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            cfg,
            dominators,
            counters: vec![0; cfg.vars.len()],
            stacks: vec![Vec::new(); cfg.vars.len()],
            phis,
            renamed: vec![Vec::new(); cfg.blocks.len()],
            undefined: Vec::new(),
        }
    }

    pub(super) fn run(&mut self, mut bodies: Vec<Vec<Instr<VarId>>>) {
        if bodies.is_empty() {
            return;
        }

        let mut steps = vec![Step::Enter(Cfg::ENTRY.index())];
        while let Some(step) = steps.pop() {
            match step {
                Step::Enter(block) => {
                    let body = mem::take(&mut bodies[block]);
                    let pushed = self.rename_block(block, body, true);
                    steps.push(Step::Exit(pushed));
                    for child in self.dominators.children(block).iter().rev() {
                        steps.push(Step::Enter(*child));
                    }
                }
                Step::Exit(pushed) => self.pop_all(&pushed),
            }
        }

        for block in 0..bodies.len() {
            if self.cfg.is_reachable(BlockId::from_len(block)) {
                continue;
            }
            let body = mem::take(&mut bodies[block]);
            let pushed = self.rename_block(block, body, false);
            self.pop_all(&pushed);
        }
    }

    fn pop_all(&mut self, pushed: &[VarId]) {
        for base in pushed {
            self.stacks[base.index()].pop();
        }
    }

    /// Rename one block and feed its successors' phis. Returns the bases
    /// whose stacks grew.
    fn rename_block(&mut self, block: usize, body: Vec<Instr<VarId>>, report: bool) -> Vec<VarId> {
        let mut pushed = Vec::new();
        let cfg = self.cfg;
        let Self {
            counters,
            stacks,
            phis,
            renamed,
            undefined,
            ..
        } = self;

        for phi in &mut phis[block] {
            let base = phi.base.index();
            phi.dst = SsaVar::new(phi.base, counters[base]);
            counters[base] += 1;
            stacks[base].push(phi.dst.version);
            pushed.push(phi.base);
        }

        let out = &mut renamed[block];
        out.reserve(body.len());
        for instr in body {
            let span = instr.span;
            let instr = instr.map_vars(&mut |var: VarId, access| {
                let base = var.index();
                match access {
                    Access::Use => match stacks[base].last() {
                        Some(version) => SsaVar::new(var, *version),
                        None => {
                            if report {
                                undefined.push(UndefinedUse { var, span });
                            }
                            SsaVar::undefined(var)
                        }
                    },
                    Access::Def => {
                        let version = counters[base];
                        counters[base] += 1;
                        stacks[base].push(version);
                        pushed.push(var);
                        SsaVar::new(var, version)
                    }
                }
            });
            out.push(instr);
        }

        let from = BlockId::from_len(block);
        let mut fed: Vec<BlockId> = Vec::new();
        for succ in cfg.succs(from) {
            if fed.contains(&succ) {
                continue;
            }
            fed.push(succ);
            for phi in &mut phis[succ.index()] {
                let current = stacks[phi.base.index()]
                    .last()
                    .map_or(SsaVar::undefined(phi.base), |v| SsaVar::new(phi.base, *v));
                phi.incoming.push((from, current));
            }
        }
        pushed
    }

    /// Assemble the blocks. Phi operands are ordered like the block's
    /// predecessors.
    pub(super) fn finish(self) -> (Vec<SsaBlock>, Vec<u32>, Vec<UndefinedUse>) {
        let cfg = self.cfg;
        let blocks = cfg
            .blocks
            .iter()
            .zip(self.phis)
            .zip(self.renamed)
            .map(|((block, phis), instrs)| {
                let phis = phis
                    .into_iter()
                    .map(|mut phi| {
                        phi.incoming.sort_by_key(|(pred, _)| {
                            block.preds.iter().position(|p| p == pred).unwrap_or(usize::MAX)
                        });
                        Instr {
                            id: phi.id,
                            kind: InstrKind::Phi {
                                dst: phi.dst,
                                incoming: phi.incoming,
                            },
                            span: Span::DUMMY,
                        }
                    })
                    .collect();
                SsaBlock {
                    id: block.id,
                    kind: block.kind,
                    reachable: cfg.is_reachable(block.id),
                    phis,
                    instrs,
                    succs: block.succs.clone(),
                    preds: block.preds.clone(),
                }
            })
            .collect();
        (blocks, self.counters, self.undefined)
    }
}

/// One `MaybeUninitialized` per variable, at its earliest offending read.
///
/// Offending reads are direct reads of the undefined version in reachable
/// blocks, and reads of a phi that (transitively) merges the undefined
/// version in from a reachable predecessor. Phis no instruction reads are
/// not observed and never report.
pub(super) fn report_uninitialized(
    cfg: &Cfg,
    blocks: &[SsaBlock],
    direct: Vec<UndefinedUse>,
    interner: &StringInterner,
) -> Diagnostics {
    let mut offending = direct;

    let mut phi_at: FxHashMap<SsaVar, (usize, usize)> = FxHashMap::default();
    for (b, block) in blocks.iter().enumerate() {
        for (p, phi) in block.phis.iter().enumerate() {
            if let InstrKind::Phi { dst, .. } = phi.kind {
                phi_at.insert(dst, (b, p));
            }
        }
    }

    if !phi_at.is_empty() {
        // (phi, span of the read that observes it)
        let mut worklist: Vec<(SsaVar, Span)> = Vec::new();
        for block in blocks.iter().filter(|b| b.reachable) {
            for instr in &block.instrs {
                for used in instr.kind.uses() {
                    if phi_at.contains_key(&used) {
                        worklist.push((used, instr.span));
                    }
                }
            }
        }

        let mut observed: FxHashSet<SsaVar> = FxHashSet::default();
        while let Some((phi, span)) = worklist.pop() {
            if !observed.insert(phi) {
                continue;
            }
            let Some(&(b, p)) = phi_at.get(&phi) else {
                continue;
            };
            let InstrKind::Phi { incoming, .. } = &blocks[b].phis[p].kind else {
                continue;
            };
            for (pred, operand) in incoming {
                if operand.is_undefined() {
                    if cfg.is_reachable(*pred) {
                        offending.push(UndefinedUse {
                            var: operand.base,
                            span,
                        });
                    }
                } else if phi_at.contains_key(operand) && !observed.contains(operand) {
                    worklist.push((*operand, span));
                }
            }
        }
    }

    offending.sort_by_key(|u| (u.span.start, u.span.end, u.var));
    let mut reported: FxHashSet<VarId> = FxHashSet::default();
    let mut diagnostics = Diagnostics::new();
    for read in offending {
        if !reported.insert(read.var) {
            continue;
        }
        let name = cfg.var(read.var).name;
        let variable = if name.is_empty() {
            format!("%{}", read.var.raw())
        } else {
            interner.lookup(name).to_string()
        };
        diagnostics.push(
            EntityKey::Function(cfg.function),
            AnalysisError::MaybeUninitialized {
                variable,
                span: read.span,
            },
        );
    }
    diagnostics
}
