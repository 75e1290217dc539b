use pretty_assertions::assert_eq;

use super::{iterated_frontier, postorder, reverse_postorder, DominatorTree, FlowGraph};

/// Adjacency-list graph rooted at node 0.
struct Graph {
    succs: Vec<Vec<usize>>,
}

impl Graph {
    fn new(succs: &[&[usize]]) -> Self {
        Self {
            succs: succs.iter().map(|s| s.to_vec()).collect(),
        }
    }
}

impl FlowGraph for Graph {
    fn node_count(&self) -> usize {
        self.succs.len()
    }

    fn entry(&self) -> usize {
        0
    }

    fn successors(&self, node: usize) -> Vec<usize> {
        self.succs[node].clone()
    }

    fn predecessors(&self, node: usize) -> Vec<usize> {
        let mut preds = Vec::new();
        for (from, succs) in self.succs.iter().enumerate() {
            if succs.contains(&node) && !preds.contains(&from) {
                preds.push(from);
            }
        }
        preds
    }
}

/// 0 → 1, 0 → 2, 1 → 3, 2 → 3.
fn diamond() -> Graph {
    Graph::new(&[&[1, 2], &[3], &[3], &[]])
}

/// 0 → 1 (header), 1 → 2 (body), 2 → 1, 1 → 3 (exit).
fn simple_loop() -> Graph {
    Graph::new(&[&[1], &[2, 3], &[1], &[]])
}

#[test]
fn postorder_visits_first_successor_first() {
    let g = diamond();
    assert_eq!(postorder(&g), vec![3, 1, 2, 0]);
    assert_eq!(reverse_postorder(&g), vec![0, 2, 1, 3]);
}

#[test]
fn postorder_skips_unreachable_nodes() {
    let g = Graph::new(&[&[1], &[], &[1]]);
    assert_eq!(postorder(&g), vec![1, 0]);
}

#[test]
fn diamond_join_is_dominated_by_entry_only() {
    let tree = DominatorTree::build(&diamond());
    assert_eq!(tree.idom(0), None);
    assert_eq!(tree.idom(1), Some(0));
    assert_eq!(tree.idom(2), Some(0));
    assert_eq!(tree.idom(3), Some(0));
    assert!(tree.dominates(0, 3));
    assert!(!tree.dominates(1, 3));
    assert!(tree.dominates(3, 3));
    assert_eq!(tree.children(0), &[1, 2, 3]);
    assert_eq!(tree.preorder(), vec![0, 1, 2, 3]);
}

#[test]
fn loop_header_dominates_body_and_exit() {
    let tree = DominatorTree::build(&simple_loop());
    assert_eq!(tree.idom(2), Some(1));
    assert_eq!(tree.idom(3), Some(1));
    assert!(tree.dominates(1, 2));
    assert!(!tree.dominates(2, 1));
}

#[test]
fn unreachable_node_has_no_dominator() {
    let g = Graph::new(&[&[1], &[], &[1]]);
    let tree = DominatorTree::build(&g);
    assert!(!tree.is_reachable(2));
    assert_eq!(tree.idom(2), None);
    assert!(!tree.dominates(0, 2));
    // The unreachable predecessor does not weaken node 1's dominator.
    assert_eq!(tree.idom(1), Some(0));
    assert_eq!(tree.preorder(), vec![0, 1]);
}

#[test]
fn diamond_frontiers() {
    let g = diamond();
    let tree = DominatorTree::build(&g);
    let df = tree.frontiers(&g);
    assert_eq!(df, vec![vec![], vec![3], vec![3], vec![]]);
}

#[test]
fn loop_body_frontier_contains_header() {
    let g = simple_loop();
    let tree = DominatorTree::build(&g);
    let df = tree.frontiers(&g);
    assert_eq!(df[2], vec![1]);
    assert_eq!(df[1], vec![1]);
    assert_eq!(df[0], Vec::<usize>::new());
}

/// Nested diamonds: a definition in the inner arm needs phis at both
/// joins.
#[test]
fn iterated_frontier_reaches_outer_join() {
    // 0 → 1, 0 → 5; 1 → 2, 1 → 3; 2 → 4; 3 → 4; 4 → 6; 5 → 6.
    let g = Graph::new(&[&[1, 5], &[2, 3], &[4], &[4], &[6], &[6], &[]]);
    let tree = DominatorTree::build(&g);
    let df = tree.frontiers(&g);
    assert_eq!(df[2], vec![4]);
    assert_eq!(df[4], vec![6]);
    assert_eq!(iterated_frontier(&df, [2]), vec![4, 6]);
    assert_eq!(iterated_frontier(&df, [0]), Vec::<usize>::new());
}
