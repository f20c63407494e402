use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::iter;
use std::ops::{Index, Range};

use crate::util::NaturalOrInfinite;
use crate::working_graph::{EdgeId, NodeId, WorkingGraph};

/// Per-node result of a (multi-source) Dijkstra run.
pub struct ShortestPaths {
    distance: Vec<NaturalOrInfinite>,
    pred_edge: Vec<Option<EdgeId>>,
}

impl ShortestPaths {
    pub fn distance(&self, node: NodeId) -> NaturalOrInfinite {
        self.distance[node.index()]
    }

    /// The edge over which `node` was reached, `None` for sources and
    /// unreachable nodes.
    pub fn predecessor(&self, node: NodeId) -> Option<EdgeId> {
        self.pred_edge[node.index()]
    }
}

pub fn dijkstra(graph: &WorkingGraph, source: NodeId) -> ShortestPaths {
    multi_source_dijkstra(graph, iter::once(source))
}

pub fn multi_source_dijkstra(
    graph: &WorkingGraph,
    sources: impl IntoIterator<Item = NodeId>,
) -> ShortestPaths {
    let mut distance = vec![NaturalOrInfinite::infinity(); graph.node_bound()];
    let mut pred_edge = vec![None; graph.node_bound()];
    let mut heap = BinaryHeap::new();
    for s in sources {
        distance[s.index()] = 0.into();
        heap.push(Reverse((NaturalOrInfinite::from(0), s)));
    }
    while let Some(Reverse((d, v))) = heap.pop() {
        if d > distance[v.index()] {
            continue; // stale entry
        }
        for (e, u) in graph.neighbors(v) {
            let nd = d + graph.distance(e);
            if nd < distance[u.index()] {
                distance[u.index()] = nd;
                pred_edge[u.index()] = Some(e);
                heap.push(Reverse((nd, u)));
            }
        }
    }
    ShortestPaths {
        distance,
        pred_edge,
    }
}

/// Is there a path from `a` to `b` of length at most `limit` that does not use
/// the edge `skip`?
///
/// Bounded bidirectional search: frontiers are expanded alternately (smaller
/// minimum first), the search gives up once both frontier minima together
/// exceed `limit` or either side has settled `max_settled` nodes. A `false`
/// answer is therefore only "not found within the budget".
pub fn detour_within(
    graph: &WorkingGraph,
    a: NodeId,
    b: NodeId,
    skip: EdgeId,
    limit: NaturalOrInfinite,
    max_settled: usize,
) -> bool {
    let inf = NaturalOrInfinite::infinity();
    let mut dist = [
        vec![inf; graph.node_bound()],
        vec![inf; graph.node_bound()],
    ];
    let mut heaps = [BinaryHeap::new(), BinaryHeap::new()];
    let mut settled = [0usize, 0usize];
    dist[0][a.index()] = 0.into();
    dist[1][b.index()] = 0.into();
    heaps[0].push(Reverse((NaturalOrInfinite::from(0), a)));
    heaps[1].push(Reverse((NaturalOrInfinite::from(0), b)));
    loop {
        let min = |h: &BinaryHeap<Reverse<(NaturalOrInfinite, NodeId)>>| {
            h.peek().map(|Reverse((d, _))| *d).unwrap_or(inf)
        };
        let (m0, m1) = (min(&heaps[0]), min(&heaps[1]));
        if m0 + m1 > limit {
            return false;
        }
        let side = if m0 <= m1 { 0 } else { 1 };
        let Some(Reverse((d, v))) = heaps[side].pop() else {
            return false;
        };
        if d > dist[side][v.index()] {
            continue;
        }
        // meeting point check against the opposite search
        if dist[1 - side][v.index()] + d <= limit {
            return true;
        }
        settled[side] += 1;
        if settled[side] > max_settled {
            return false;
        }
        for (e, u) in graph.neighbors(v) {
            if e == skip {
                continue;
            }
            let nd = d + graph.distance(e);
            if nd <= limit && nd < dist[side][u.index()] {
                dist[side][u.index()] = nd;
                heaps[side].push(Reverse((nd, u)));
            }
        }
    }
}

/// All-pairs distances over the live nodes of a working graph, computed with
/// Floyd-Warshall. Indexed by dense node indices (`matrix[a][b]`); rows of
/// dead nodes stay at infinity.
pub struct DistanceMatrix {
    distances: Vec<NaturalOrInfinite>,
    dimension: usize,
}

impl DistanceMatrix {
    pub fn new(graph: &WorkingGraph) -> Self {
        let n = graph.node_bound();
        let mut res = DistanceMatrix {
            distances: vec![NaturalOrInfinite::infinity(); n * n],
            dimension: n,
        };
        res.floyd_warshall(graph);
        res
    }

    /// Based on the pseudo-code
    /// [on Wikipedia](https://en.wikipedia.org/wiki/Floyd%E2%80%93Warshall_algorithm).
    fn floyd_warshall(&mut self, graph: &WorkingGraph) {
        for e in graph.edge_ids() {
            let (a, b) = graph.endpoints(e);
            if a == b {
                continue;
            }
            let w = graph.distance(e);
            // parallel edges: keep the cheaper one
            if w < self[a.index()][b.index()] {
                self[a.index()][b.index()] = w;
                self[b.index()][a.index()] = w;
            }
        }
        let nodes: Vec<usize> = graph.node_ids().map(NodeId::index).collect();
        for &n in &nodes {
            self[n][n] = 0.into();
        }
        for &k in &nodes {
            for &i in &nodes {
                for &j in &nodes {
                    let new_dist = self[i][k] + self[k][j];
                    if new_dist < self[i][j] {
                        self[i][j] = new_dist;
                    }
                }
            }
        }
    }

    fn index_range(&self, index: usize) -> Range<usize> {
        let start = index * self.dimension;
        start..start + self.dimension
    }
}

/// This allows for neat two-dimensional indexing (e.g. `matrix[a][b]`).
impl Index<usize> for DistanceMatrix {
    type Output = [NaturalOrInfinite];

    fn index(&self, index: usize) -> &Self::Output {
        &self.distances[self.index_range(index)]
    }
}

impl std::ops::IndexMut<usize> for DistanceMatrix {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let range = self.index_range(index);
        &mut self.distances[range]
    }
}
