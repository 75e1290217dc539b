//! Dominance analysis shared by SSA construction.
//!
//! Works on anything implementing [`FlowGraph`], so the algorithms can be
//! tested on small hand-built graphs as well as real [`Cfg`]s.

use rustc_hash::FxHashSet;

use crate::cfg::Cfg;
use crate::ir::BlockId;

/// A rooted directed graph with dense `usize` node indices.
pub trait FlowGraph {
    fn node_count(&self) -> usize;
    fn entry(&self) -> usize;
    fn successors(&self, node: usize) -> Vec<usize>;
    /// Distinct predecessors.
    fn predecessors(&self, node: usize) -> Vec<usize>;
}

impl FlowGraph for Cfg {
    fn node_count(&self) -> usize {
        self.len()
    }

    fn entry(&self) -> usize {
        Cfg::ENTRY.index()
    }

    fn successors(&self, node: usize) -> Vec<usize> {
        self.succs(BlockId::from_len(node)).map(BlockId::index).collect()
    }

    fn predecessors(&self, node: usize) -> Vec<usize> {
        self.preds(BlockId::from_len(node))
            .iter()
            .map(|b| b.index())
            .collect()
    }
}

/// Postorder over the nodes reachable from the entry.
///
/// Iterative DFS with an explicit stack; deep nesting cannot overflow.
pub fn postorder(graph: &impl FlowGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    if n == 0 {
        return order;
    }

    // (node, children pushed)
    let mut stack: Vec<(usize, bool)> = vec![(graph.entry(), false)];
    while let Some(top) = stack.last_mut() {
        let (node, children_done) = *top;
        if children_done {
            order.push(node);
            stack.pop();
            continue;
        }
        top.1 = true;
        if visited[node] {
            stack.pop();
            continue;
        }
        visited[node] = true;
        // Reversed so the first successor is explored first.
        for succ in graph.successors(node).into_iter().rev() {
            if !visited[succ] {
                stack.push((succ, false));
            }
        }
    }
    order
}

pub fn reverse_postorder(graph: &impl FlowGraph) -> Vec<usize> {
    let mut order = postorder(graph);
    order.reverse();
    order
}

/// Immediate dominators, computed with the Cooper-Harvey-Kennedy
/// iterative algorithm over reverse postorder.
///
/// Unreachable nodes have no immediate dominator and dominate nothing but
/// themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DominatorTree {
    /// `idom[entry] == Some(entry)`; `None` for unreachable nodes.
    idom: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    entry: usize,
}

impl DominatorTree {
    pub fn build(graph: &impl FlowGraph) -> Self {
        let n = graph.node_count();
        if n == 0 {
            return Self {
                idom: Vec::new(),
                children: Vec::new(),
                entry: 0,
            };
        }

        let entry = graph.entry();
        let preds: Vec<Vec<usize>> = (0..n).map(|i| graph.predecessors(i)).collect();
        let rpo = reverse_postorder(graph);
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &node) in rpo.iter().enumerate() {
            rpo_pos[node] = pos;
        }

        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let mut processed = preds[node].iter().copied().filter(|p| idom[*p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom =
                    processed.fold(first, |acc, pred| Self::intersect(pred, acc, &idom, &rpo_pos));
                if idom[node] != Some(new_idom) {
                    idom[node] = Some(new_idom);
                    changed = true;
                }
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, dom) in idom.iter().enumerate() {
            if let Some(dom) = *dom {
                if dom != node {
                    children[dom].push(node);
                }
            }
        }

        Self {
            idom,
            children,
            entry,
        }
    }

    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                a = idom[a].unwrap_or(a);
            }
            while rpo_pos[b] > rpo_pos[a] {
                b = idom[b].unwrap_or(b);
            }
        }
        a
    }

    /// Immediate dominator; `None` for the entry and unreachable nodes.
    pub fn idom(&self, node: usize) -> Option<usize> {
        self.idom
            .get(node)
            .copied()
            .flatten()
            .filter(|d| *d != node)
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        self.idom.get(node).is_some_and(Option::is_some)
    }

    /// Does `a` dominate `b`? Every node dominates itself.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom(current) {
                Some(dom) => current = dom,
                None => return false,
            }
        }
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Reachable nodes in dominator-tree preorder, children in index order.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.idom.len());
        if self.idom.is_empty() {
            return order;
        }
        let mut stack = vec![self.entry];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children[node].iter().rev().copied());
        }
        order
    }

    /// Dominance frontier of every node.
    ///
    /// For each join node, walk up from each reachable predecessor until
    /// reaching the join's immediate dominator; every node passed has the
    /// join in its frontier.
    pub fn frontiers(&self, graph: &impl FlowGraph) -> Vec<Vec<usize>> {
        let n = self.idom.len();
        let mut frontiers: Vec<Vec<usize>> = vec![Vec::new(); n];
        for node in 0..n {
            if !self.is_reachable(node) {
                continue;
            }
            let preds: Vec<usize> = graph
                .predecessors(node)
                .into_iter()
                .filter(|p| self.is_reachable(*p))
                .collect();
            if preds.len() < 2 {
                continue;
            }
            let Some(stop) = self.idom(node) else {
                continue;
            };
            for pred in preds {
                let mut runner = pred;
                while runner != stop {
                    if !frontiers[runner].contains(&node) {
                        frontiers[runner].push(node);
                    }
                    match self.idom(runner) {
                        Some(up) => runner = up,
                        None => break,
                    }
                }
            }
        }
        for frontier in &mut frontiers {
            frontier.sort_unstable();
        }
        frontiers
    }
}

/// Iterated dominance frontier of `defs`: where a variable defined in
/// those nodes needs a phi. Sorted.
pub fn iterated_frontier(frontiers: &[Vec<usize>], defs: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut result: FxHashSet<usize> = FxHashSet::default();
    let mut worklist: Vec<usize> = defs.into_iter().collect();
    let mut queued: FxHashSet<usize> = worklist.iter().copied().collect();
    while let Some(node) = worklist.pop() {
        for &join in &frontiers[node] {
            if result.insert(join) && queued.insert(join) {
                worklist.push(join);
            }
        }
    }
    let mut result: Vec<usize> = result.into_iter().collect();
    result.sort_unstable();
    result
}

#[cfg(test)]
mod tests;
