//! Control-flow graph construction.
//!
//! Cuts a lowered function's flat instruction sequence into basic blocks
//! and connects them with labeled edges.
//!
//! # Block Boundaries
//!
//! A block ends after any instruction for which
//! [`InstrKind::ends_block`] holds: jumps, branches, exits, `Require` and
//! the calls that may raise. A block starts at every label. Labels are
//! consumed here; the resulting blocks contain no `Label` instructions.
//!
//! # Edges
//!
//! - `Jump` → one `Fallthrough` edge, reclassified as `LoopBack` when it
//!   closes a DFS back edge
//! - `Branch` → `True` and `False`
//! - `Require`, `ExternalCall`, `NewContract` → `Fallthrough` to the next
//!   block plus `Exceptional` to the per-function unwind sink
//! - anything else → `Fallthrough` to the next block
//!
//! Unreachable blocks are kept and flagged, never deleted.

use rustc_hash::FxHashMap;
use slir_ir::{FunctionId, Span};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::ir::{BlockId, Instr, InstrId, InstrKind, IrVar, LabelId, LoweredFunction, Operand, VarId};

/// Edge label.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EdgeKind {
    Fallthrough,
    True,
    False,
    /// Unconditional edge closing a loop.
    LoopBack,
    /// To the unwind sink when the instruction reverts.
    Exceptional,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Edge {
    pub target: BlockId,
    pub kind: EdgeKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BlockKind {
    Normal,
    /// Synthetic sink for exceptional edges. Holds no instructions.
    Unwind,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BasicBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub instrs: Vec<Instr<VarId>>,
    pub succs: SmallVec<[Edge; 2]>,
    /// Distinct predecessors, in edge-creation order.
    pub preds: SmallVec<[BlockId; 2]>,
}

impl BasicBlock {
    fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            instrs: Vec::new(),
            succs: SmallVec::new(),
            preds: SmallVec::new(),
        }
    }

    /// The block-ending instruction, if the block has one.
    pub fn control(&self) -> Option<&Instr<VarId>> {
        self.instrs.last().filter(|i| i.kind.ends_block())
    }

    /// Leaves the function: ends in `Return`/`Revert`, or is the unwind sink.
    pub fn is_exit(&self) -> bool {
        self.kind == BlockKind::Unwind || self.instrs.last().is_some_and(|i| i.kind.is_exit())
    }
}

/// A function's CFG. Owns the variables and instructions of the lowered
/// function it was built from.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Cfg {
    pub function: FunctionId,
    pub blocks: Vec<BasicBlock>,
    pub vars: Vec<IrVar>,
    pub params: Vec<VarId>,
    pub returns: Vec<VarId>,
    pub partial: bool,
    unwind: Option<BlockId>,
    reachable: Vec<bool>,
    loop_headers: Vec<BlockId>,
    non_terminating: Vec<BlockId>,
    block_of: FxHashMap<InstrId, BlockId>,
    /// First instruction id not used by any instruction.
    next_instr_id: u32,
}

impl Cfg {
    pub const ENTRY: BlockId = BlockId::new(0);

    pub fn entry(&self) -> BlockId {
        Self::ENTRY
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn var(&self, id: VarId) -> &IrVar {
        &self.vars[id.index()]
    }

    pub fn succs(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.block(id).succs.iter().map(|e| e.target)
    }

    pub fn preds(&self, id: BlockId) -> &[BlockId] {
        &self.block(id).preds
    }

    /// Every edge as `(from, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (BlockId, Edge)> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.succs.iter().map(move |e| (b.id, *e)))
    }

    pub fn unwind(&self) -> Option<BlockId> {
        self.unwind
    }

    pub fn is_reachable(&self, id: BlockId) -> bool {
        self.reachable[id.index()]
    }

    pub fn unreachable_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .map(|b| b.id)
            .filter(|id| !self.is_reachable(*id))
    }

    /// Targets of loop-back edges.
    pub fn loop_headers(&self) -> &[BlockId] {
        &self.loop_headers
    }

    /// Reachable blocks from which no exit is reachable.
    pub fn non_terminating(&self) -> &[BlockId] {
        &self.non_terminating
    }

    pub fn may_not_terminate(&self) -> bool {
        !self.non_terminating.is_empty()
    }

    pub fn block_of(&self, instr: InstrId) -> Option<BlockId> {
        self.block_of.get(&instr).copied()
    }

    pub fn next_instr_id(&self) -> u32 {
        self.next_instr_id
    }

    pub fn instrs(&self) -> impl Iterator<Item = &Instr<VarId>> + '_ {
        self.blocks.iter().flat_map(|b| b.instrs.iter())
    }
}

// ── Construction ────────────────────────────────────────────────────

/// Partition `lowered` into blocks and connect them.
#[tracing::instrument(level = "debug", skip_all, fields(function = lowered.function.raw()))]
pub fn build_cfg(lowered: LoweredFunction) -> Cfg {
    let LoweredFunction {
        function,
        vars,
        instrs,
        params,
        returns,
        partial,
    } = lowered;
    let mut next_instr_id = instrs
        .iter()
        .map(|i| i.id.raw() + 1)
        .max()
        .unwrap_or(0);

    let (mut blocks, labels) = partition(instrs);

    // Edges
    let mut unwind: Option<BlockId> = None;
    let normal_count = blocks.len();
    for index in 0..normal_count {
        let next = (index + 1 < normal_count).then(|| BlockId::from_len(index + 1));
        let mut succs: SmallVec<[Edge; 2]> = SmallVec::new();
        let control = blocks[index].instrs.last().map(|i| i.kind.clone());
        match control {
            Some(InstrKind::Jump { target }) => {
                succs.push(edge(label_target(&labels, target), EdgeKind::Fallthrough));
            }
            Some(InstrKind::Branch {
                then_label,
                else_label,
                ..
            }) => {
                succs.push(edge(label_target(&labels, then_label), EdgeKind::True));
                succs.push(edge(label_target(&labels, else_label), EdgeKind::False));
            }
            Some(InstrKind::Return { .. } | InstrKind::Revert { .. }) => {}
            Some(kind) if kind.may_raise() => {
                let sink = *unwind.get_or_insert_with(|| {
                    let id = BlockId::from_len(blocks.len());
                    blocks.push(BasicBlock::new(id, BlockKind::Unwind));
                    id
                });
                if let Some(next) = next {
                    succs.push(edge(next, EdgeKind::Fallthrough));
                }
                succs.push(edge(sink, EdgeKind::Exceptional));
            }
            _ => {
                if let Some(next) = next {
                    succs.push(edge(next, EdgeKind::Fallthrough));
                }
            }
        }

        // Falling off the end of the sequence: close it with a return.
        let falls_off = next.is_none()
            && !blocks[index]
                .instrs
                .last()
                .is_some_and(|i| i.kind.is_terminator());
        if falls_off {
            warn!(
                function = function.raw(),
                block = index,
                "unterminated instruction sequence, adding implicit return"
            );
            let span = blocks[index].instrs.last().map_or(Span::DUMMY, |i| i.span);
            let values = returns.iter().map(|r| Operand::Var(*r)).collect();
            let ret = Instr {
                id: InstrId::new(next_instr_id),
                kind: InstrKind::Return { values },
                span,
            };
            next_instr_id += 1;
            if blocks[index].instrs.last().is_some_and(|i| i.kind.ends_block()) {
                let id = BlockId::from_len(blocks.len());
                let mut tail = BasicBlock::new(id, BlockKind::Normal);
                tail.instrs.push(ret);
                blocks.push(tail);
                succs.insert(0, edge(id, EdgeKind::Fallthrough));
            } else {
                blocks[index].instrs.push(ret);
            }
        }
        blocks[index].succs = succs;
    }

    link_predecessors(&mut blocks);
    let reachable = reachability(&blocks);
    let loop_headers = classify_back_edges(&mut blocks);
    let non_terminating = find_non_terminating(&blocks, &reachable);

    let block_of = blocks
        .iter()
        .flat_map(|b| b.instrs.iter().map(move |i| (i.id, b.id)))
        .collect();

    debug!(
        blocks = blocks.len(),
        unreachable = reachable.iter().filter(|r| !**r).count(),
        loops = loop_headers.len(),
        "CFG construction complete"
    );

    Cfg {
        function,
        blocks,
        vars,
        params,
        returns,
        partial,
        unwind,
        reachable,
        loop_headers,
        non_terminating,
        block_of,
        next_instr_id,
    }
}

fn edge(target: BlockId, kind: EdgeKind) -> Edge {
    Edge { target, kind }
}

/// Lowering places every label it jumps to. A jump to an unplaced label is
/// a lowering bug; release builds route it to the entry.
fn label_target(labels: &FxHashMap<LabelId, BlockId>, label: LabelId) -> BlockId {
    let target = labels.get(&label).copied();
    debug_assert!(target.is_some(), "jump to unplaced label {label:?}");
    target.unwrap_or(Cfg::ENTRY)
}

/// Assign instructions to blocks. Blocks are created lazily, so a run of
/// labels shares one block.
fn partition(instrs: Vec<Instr<VarId>>) -> (Vec<BasicBlock>, FxHashMap<LabelId, BlockId>) {
    let mut blocks = vec![BasicBlock::new(Cfg::ENTRY, BlockKind::Normal)];
    let mut labels: FxHashMap<LabelId, BlockId> = FxHashMap::default();
    let mut pending_split = false;

    for instr in instrs {
        let current = blocks.len() - 1;
        if let InstrKind::Label(label) = instr.kind {
            // The entry never doubles as a jump target: it must stay
            // predecessor-free.
            let reuse = !pending_split && current != 0 && blocks[current].instrs.is_empty();
            if !reuse {
                blocks.push(BasicBlock::new(
                    BlockId::from_len(blocks.len()),
                    BlockKind::Normal,
                ));
            }
            labels.insert(label, BlockId::from_len(blocks.len() - 1));
            pending_split = false;
            continue;
        }
        if pending_split {
            blocks.push(BasicBlock::new(
                BlockId::from_len(blocks.len()),
                BlockKind::Normal,
            ));
            pending_split = false;
        }
        pending_split = instr.kind.ends_block();
        if let Some(block) = blocks.last_mut() {
            block.instrs.push(instr);
        }
    }
    (blocks, labels)
}

fn link_predecessors(blocks: &mut [BasicBlock]) {
    let links: Vec<(BlockId, BlockId)> = blocks
        .iter()
        .flat_map(|b| b.succs.iter().map(move |e| (b.id, e.target)))
        .collect();
    for (from, to) in links {
        let preds = &mut blocks[to.index()].preds;
        if !preds.contains(&from) {
            preds.push(from);
        }
    }
}

fn reachability(blocks: &[BasicBlock]) -> Vec<bool> {
    let mut reachable = vec![false; blocks.len()];
    let mut stack = vec![Cfg::ENTRY];
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut reachable[id.index()], true) {
            continue;
        }
        stack.extend(blocks[id.index()].succs.iter().map(|e| e.target));
    }
    reachable
}

/// Iterative DFS from the entry. An unconditional edge into a block still
/// on the DFS stack closes a loop: it becomes `LoopBack` and its target a
/// loop header.
fn classify_back_edges(blocks: &mut [BasicBlock]) -> Vec<BlockId> {
    #[derive(Copy, Clone, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color = vec![Color::White; blocks.len()];
    let mut back_edges: Vec<(usize, usize)> = Vec::new();
    // (block, next successor index)
    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    color[0] = Color::Gray;

    while let Some(top) = stack.last_mut() {
        let (block, edge_index) = *top;
        let succs = &blocks[block].succs;
        if edge_index >= succs.len() {
            color[block] = Color::Black;
            stack.pop();
            continue;
        }
        top.1 += 1;
        let target = succs[edge_index].target.index();
        match color[target] {
            Color::White => {
                color[target] = Color::Gray;
                stack.push((target, 0));
            }
            Color::Gray => back_edges.push((block, edge_index)),
            Color::Black => {}
        }
    }

    let mut headers = Vec::new();
    for (block, edge_index) in back_edges {
        let edge = &mut blocks[block].succs[edge_index];
        if edge.kind == EdgeKind::Fallthrough {
            edge.kind = EdgeKind::LoopBack;
            if !headers.contains(&edge.target) {
                headers.push(edge.target);
            }
        }
    }
    headers.sort_unstable();
    headers
}

/// Reachable blocks with no path to an exit.
fn find_non_terminating(blocks: &[BasicBlock], reachable: &[bool]) -> Vec<BlockId> {
    let mut reaches_exit = vec![false; blocks.len()];
    let mut stack: Vec<BlockId> = blocks.iter().filter(|b| b.is_exit()).map(|b| b.id).collect();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut reaches_exit[id.index()], true) {
            continue;
        }
        stack.extend(blocks[id.index()].preds.iter().copied());
    }
    blocks
        .iter()
        .map(|b| b.id)
        .filter(|id| reachable[id.index()] && !reaches_exit[id.index()])
        .collect()
}
