use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::decomposition::SpanningTree;
use crate::util::NaturalOrInfinite;
use crate::working_graph::{canonical_pair, EdgeId, NodeId, WorkingGraph};

/// Partition of the graph nodes by nearest terminal: for every node its seed
/// terminal, the distance to it, and the predecessor edge on a shortest path
/// towards it. Nodes unreachable from every terminal have no seed.
pub struct VoronoiPartition {
    seed: Vec<Option<NodeId>>,
    distance: Vec<NaturalOrInfinite>,
    pred_edge: Vec<Option<EdgeId>>,
}

impl VoronoiPartition {
    pub fn compute(graph: &WorkingGraph, terminals: &[NodeId]) -> Self {
        let mut seed = vec![None; graph.node_bound()];
        let mut distance = vec![NaturalOrInfinite::infinity(); graph.node_bound()];
        let mut pred_edge = vec![None; graph.node_bound()];
        let mut heap = BinaryHeap::new();
        for &t in terminals {
            seed[t.index()] = Some(t);
            distance[t.index()] = 0.into();
            heap.push(Reverse((NaturalOrInfinite::from(0), t)));
        }
        while let Some(Reverse((d, v))) = heap.pop() {
            if d > distance[v.index()] {
                continue;
            }
            for (e, u) in graph.neighbors(v) {
                let nd = d + graph.distance(e);
                if nd < distance[u.index()] {
                    distance[u.index()] = nd;
                    seed[u.index()] = seed[v.index()];
                    pred_edge[u.index()] = Some(e);
                    heap.push(Reverse((nd, u)));
                }
            }
        }
        VoronoiPartition {
            seed,
            distance,
            pred_edge,
        }
    }

    pub fn seed(&self, node: NodeId) -> Option<NodeId> {
        self.seed[node.index()]
    }

    pub fn distance(&self, node: NodeId) -> NaturalOrInfinite {
        self.distance[node.index()]
    }

    /// The edges of the shortest path from `node` back to its seed terminal.
    pub fn path_to_seed(&self, graph: &WorkingGraph, node: NodeId) -> Vec<EdgeId> {
        let mut path = Vec::new();
        let mut v = node;
        while let Some(e) = self.pred_edge[v.index()] {
            path.push(e);
            v = graph.other_endpoint(e, v);
        }
        path
    }
}

/// The cheapest edge connecting two Voronoi regions, together with the cost of
/// the full terminal-to-terminal path through it.
#[derive(Clone, Copy, Debug)]
pub struct Bridge {
    pub edge: EdgeId,
    pub t1: NodeId,
    pub t2: NodeId,
    pub cost: NaturalOrInfinite,
}

/// One [`Bridge`] per adjacent terminal pair, cheapest first.
pub fn terminal_distance_network(graph: &WorkingGraph, vor: &VoronoiPartition) -> Vec<Bridge> {
    let mut best: HashMap<(NodeId, NodeId), Bridge> = HashMap::new();
    for e in graph.edge_ids() {
        let (x, y) = graph.endpoints(e);
        let (Some(t1), Some(t2)) = (vor.seed(x), vor.seed(y)) else {
            continue;
        };
        if t1 == t2 {
            continue;
        }
        let cost = vor.distance(x) + graph.distance(e) + vor.distance(y);
        let key = canonical_pair(t1, t2);
        let better = best.get(&key).map(|b| cost < b.cost).unwrap_or(true);
        if better {
            best.insert(
                key,
                Bridge {
                    edge: e,
                    t1: key.0,
                    t2: key.1,
                    cost,
                },
            );
        }
    }
    let mut bridges: Vec<Bridge> = best.into_values().collect();
    bridges.sort_by_key(|b| (b.cost, b.edge));
    bridges
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[ra] = rb;
        true
    }
}

/// Kruskal MST over the terminal distance network. Input must be sorted by
/// cost (as produced by [`terminal_distance_network`]).
pub fn network_mst(bridges: &[Bridge], terminals: &[NodeId]) -> Vec<Bridge> {
    let index: HashMap<NodeId, usize> = terminals
        .iter()
        .enumerate()
        .map(|(i, &t)| (t, i))
        .collect();
    let mut uf = UnionFind::new(terminals.len());
    let mut mst = Vec::new();
    for b in bridges {
        if uf.union(index[&b.t1], index[&b.t2]) {
            mst.push(*b);
        }
    }
    mst
}

/// Build a spanning tree over the terminals: the MST bridges of the terminal
/// distance network, expanded back to actual graph paths, then a BFS spanning
/// tree of the expanded subgraph rooted at a terminal. Returns `None` when the
/// terminals do not all lie in one component.
pub fn terminal_spanning_tree(graph: &WorkingGraph, terminals: &[NodeId]) -> Option<SpanningTree> {
    if terminals.is_empty() {
        return None;
    }
    let terminal_set: HashSet<NodeId> = terminals.iter().copied().collect();
    if terminals.len() == 1 {
        return Some(SpanningTree::with_root(terminals[0], true));
    }
    let vor = VoronoiPartition::compute(graph, terminals);
    let bridges = terminal_distance_network(graph, &vor);
    let mst = network_mst(&bridges, terminals);
    if mst.len() + 1 < terminals.len() {
        return None;
    }
    let mut sub_edges: HashSet<EdgeId> = HashSet::new();
    for b in &mst {
        sub_edges.insert(b.edge);
        let (x, y) = graph.endpoints(b.edge);
        sub_edges.extend(vor.path_to_seed(graph, x));
        sub_edges.extend(vor.path_to_seed(graph, y));
    }
    let mut adjacency: HashMap<NodeId, Vec<(EdgeId, NodeId)>> = HashMap::new();
    for &e in &sub_edges {
        let (x, y) = graph.endpoints(e);
        adjacency.entry(x).or_default().push((e, y));
        adjacency.entry(y).or_default().push((e, x));
    }
    let root = terminals[0];
    let mut tree = SpanningTree::with_root(root, true);
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root);
    while let Some(v) = queue.pop_front() {
        let Some(neighbors) = adjacency.get(&v) else {
            continue;
        };
        for &(e, u) in neighbors {
            if tree.contains(u) {
                continue;
            }
            tree.add_child(v, u, graph.weight(e), terminal_set.contains(&u));
            queue.push_back(u);
        }
    }
    debug_assert!(terminals.iter().all(|&t| tree.contains(t)));
    Some(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{six_cycle, steiner_example_wiki};
    use crate::util::TestResult;

    fn node(i: usize, graph: &WorkingGraph) -> NodeId {
        graph.node_ids().nth(i).unwrap()
    }

    #[test]
    fn test_partition_six_cycle() -> TestResult {
        let graph = WorkingGraph::from_graph(&six_cycle()?);
        let terminals = [node(0, &graph), node(3, &graph)];
        let vor = VoronoiPartition::compute(&graph, &terminals);
        assert_eq!(vor.seed(terminals[0]), Some(terminals[0]));
        assert_eq!(vor.distance(terminals[0]), 0.into());
        assert_eq!(vor.seed(node(2, &graph)), Some(terminals[1]));
        assert_eq!(vor.distance(node(2, &graph)), 1.into());
        assert_eq!(vor.seed(node(1, &graph)), Some(terminals[0]));
        Ok(())
    }

    #[test]
    fn test_distance_network_six_cycle() -> TestResult {
        let graph = WorkingGraph::from_graph(&six_cycle()?);
        let terminals = [node(0, &graph), node(3, &graph)];
        let vor = VoronoiPartition::compute(&graph, &terminals);
        let bridges = terminal_distance_network(&graph, &vor);
        // one adjacent pair, cheapest crossing has full cost 3
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].cost, 3.into());
        let mst = network_mst(&bridges, &terminals);
        assert_eq!(mst.len(), 1);
        Ok(())
    }

    #[test]
    fn test_terminal_spanning_tree_spans_terminals() -> TestResult {
        let graph = WorkingGraph::from_graph(&steiner_example_wiki()?);
        let terminals: Vec<NodeId> = [0, 6, 7, 8, 11]
            .iter()
            .map(|&i| node(i, &graph))
            .collect();
        let tree = terminal_spanning_tree(&graph, &terminals).unwrap();
        for &t in &terminals {
            assert!(tree.contains(t));
        }
        assert!(tree.len() >= terminals.len());
        Ok(())
    }

    #[test]
    fn test_unreachable_terminals() {
        let mut graph = WorkingGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        assert!(terminal_spanning_tree(&graph, &[a, b]).is_none());
    }
}
