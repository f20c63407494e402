use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::util::NaturalOrInfinite;
use crate::working_graph::{NodeId, WorkingGraph};

/// For every node, the `k` closest terminals together with their distances,
/// ascending. Paths are not allowed to pass through other terminals, so the
/// lists describe reachability within a single Voronoi-like neighbourhood.
pub struct ClosestTerminals {
    lists: Vec<Vec<(NodeId, NaturalOrInfinite)>>,
}

impl ClosestTerminals {
    pub fn compute(graph: &WorkingGraph, terminals: &[NodeId], k: usize) -> Self {
        let mut is_terminal = vec![false; graph.node_bound()];
        for &t in terminals {
            is_terminal[t.index()] = true;
        }
        let mut lists: Vec<Vec<(NodeId, NaturalOrInfinite)>> =
            vec![Vec::new(); graph.node_bound()];
        let mut heap = BinaryHeap::new();
        for &t in terminals {
            heap.push(Reverse((NaturalOrInfinite::from(0), t, t)));
        }
        // entries leave the heap in ascending distance order, so every node's
        // list is filled closest-first
        while let Some(Reverse((d, v, source))) = heap.pop() {
            let list = &mut lists[v.index()];
            if list.len() == k || list.iter().any(|&(t, _)| t == source) {
                continue;
            }
            list.push((source, d));
            // do not search through other terminals
            if is_terminal[v.index()] && v != source {
                continue;
            }
            for (e, u) in graph.neighbors(v) {
                let target = &lists[u.index()];
                if target.len() == k || target.iter().any(|&(t, _)| t == source) {
                    continue;
                }
                heap.push(Reverse((d + graph.distance(e), u, source)));
            }
        }
        ClosestTerminals { lists }
    }

    /// The up to `k` closest terminals of `node`, closest first. Shorter lists
    /// mean fewer than `k` terminals are reachable. Nodes created after the
    /// computation get an empty list.
    pub fn closest(&self, node: NodeId) -> &[(NodeId, NaturalOrInfinite)] {
        self.lists.get(node.index()).map_or(&[], Vec::as_slice)
    }
}
