use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::shortest_paths::multi_source_dijkstra;
use crate::steiner_tree::tree::EdgeTree;
use crate::util::NaturalOrInfinite;
use crate::working_graph::{EdgeId, NodeId, WorkingGraph};

/// A Steiner tree algorithm over a [`WorkingGraph`]. Implementations return
/// the tree weight and the tree itself; for disconnected terminals the weight
/// is infinite and the tree empty.
pub trait SteinerSolver {
    fn solve(&self, graph: &WorkingGraph, terminals: &[NodeId]) -> (NaturalOrInfinite, EdgeTree);
}

/// Takahashi-Matsuyama path heuristic: grow a tree from one terminal by
/// repeatedly attaching the nearest not-yet-connected terminal over a shortest
/// path. A `2 - 2/|T|` approximation, used to produce upper bounds.
pub struct TakahashiMatsuyama;

impl SteinerSolver for TakahashiMatsuyama {
    fn solve(&self, graph: &WorkingGraph, terminals: &[NodeId]) -> (NaturalOrInfinite, EdgeTree) {
        let mut tree = EdgeTree::empty();
        if terminals.len() <= 1 {
            return (0.into(), tree);
        }
        let mut in_tree: HashSet<NodeId> = HashSet::from([terminals[0]]);
        let mut remaining: HashSet<NodeId> = terminals[1..].iter().copied().collect();
        while !remaining.is_empty() {
            let paths = multi_source_dijkstra(graph, in_tree.iter().copied());
            let &next = remaining
                .iter()
                .min_by_key(|&&t| paths.distance(t))
                .unwrap();
            if !paths.distance(next).is_finite() {
                return (NaturalOrInfinite::infinity(), EdgeTree::empty());
            }
            let mut v = next;
            while let Some(e) = paths.predecessor(v) {
                tree.insert(e);
                in_tree.insert(v);
                v = graph.other_endpoint(e, v);
            }
            in_tree.insert(v);
            remaining.retain(|t| !in_tree.contains(t));
        }
        (tree.weight_in(graph), tree)
    }
}

/// How an entry of the Dreyfus-Wagner table was obtained; enough to walk the
/// table backwards and reassemble the tree.
#[derive(Clone, Copy)]
enum Back {
    Leaf,
    Merge(u32),
    Edge(EdgeId),
}

/// Dreyfus-Wagner algorithm for a minimum Steiner tree, in the
/// subset-DP-plus-Dijkstra formulation: `dp[S][v]` is the weight of a minimum
/// tree spanning the terminal subset `S` together with `v`. Exponential in the
/// number of terminals, so only usable on small instances (or after heavy
/// reduction).
pub struct DreyfusWagner;

impl SteinerSolver for DreyfusWagner {
    fn solve(&self, graph: &WorkingGraph, terminals: &[NodeId]) -> (NaturalOrInfinite, EdgeTree) {
        let k = terminals.len();
        if k <= 1 {
            return (0.into(), EdgeTree::empty());
        }
        assert!(k <= 24, "exact solver is exponential in the number of terminals");
        let n = graph.node_bound();
        let full = (1usize << k) - 1;
        let inf = NaturalOrInfinite::infinity();
        let mut dp = vec![vec![inf; n]; full + 1];
        let mut back = vec![vec![Back::Leaf; n]; full + 1];
        for (i, &t) in terminals.iter().enumerate() {
            dp[1 << i][t.index()] = 0.into();
        }
        for mask in 1..=full {
            // merge two sub-trees meeting at v
            let mut sub = (mask - 1) & mask;
            while sub > 0 {
                let rest = mask ^ sub;
                if sub <= rest {
                    for v in graph.node_ids() {
                        let combined = dp[sub][v.index()] + dp[rest][v.index()];
                        if combined < dp[mask][v.index()] {
                            dp[mask][v.index()] = combined;
                            back[mask][v.index()] = Back::Merge(sub as u32);
                        }
                    }
                }
                sub = (sub - 1) & mask;
            }
            // extend trees along shortest paths
            let mut heap: BinaryHeap<Reverse<(NaturalOrInfinite, NodeId)>> = graph
                .node_ids()
                .filter(|v| dp[mask][v.index()].is_finite())
                .map(|v| Reverse((dp[mask][v.index()], v)))
                .collect();
            while let Some(Reverse((d, v))) = heap.pop() {
                if d > dp[mask][v.index()] {
                    continue;
                }
                for (e, u) in graph.neighbors(v) {
                    let nd = d + graph.distance(e);
                    if nd < dp[mask][u.index()] {
                        dp[mask][u.index()] = nd;
                        back[mask][u.index()] = Back::Edge(e);
                        heap.push(Reverse((nd, u)));
                    }
                }
            }
        }
        let root = terminals[0];
        let weight = dp[full][root.index()];
        if !weight.is_finite() {
            return (inf, EdgeTree::empty());
        }
        let mut tree = EdgeTree::empty();
        let mut stack = vec![(full, root)];
        while let Some((mask, v)) = stack.pop() {
            match back[mask][v.index()] {
                Back::Leaf => {}
                Back::Merge(sub) => {
                    stack.push((sub as usize, v));
                    stack.push((mask ^ sub as usize, v));
                }
                Back::Edge(e) => {
                    tree.insert(e);
                    stack.push((mask, graph.other_endpoint(e, v)));
                }
            }
        }
        debug_assert_eq!(tree.weight_in(graph), weight);
        (weight, tree)
    }
}
