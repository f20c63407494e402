use std::collections::HashMap;

use crate::graph::Graph;
use crate::util::NaturalOrInfinite;

/// Opaque handle to a node of a [`WorkingGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u32);

/// Opaque handle to an edge of a [`WorkingGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeId(u32);

impl NodeId {
    /// Position in dense side arrays (see [`WorkingGraph::node_bound`]).
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    adj: Vec<EdgeId>,
    alive: bool,
}

#[derive(Clone, Copy, Debug)]
struct EdgeData {
    a: NodeId,
    b: NodeId,
    weight: u64,
    alive: bool,
}

/// The engine-owned mutable copy of the instance.
///
/// Nodes and edges live in append-only arenas addressed by [`NodeId`] /
/// [`EdgeId`]; deletion flips a liveness flag and unlinks adjacency, so
/// handles of deleted elements stay stable for the provenance index. Parallel
/// edges and self-loops are representable (reductions create them and
/// `make_simple` cleans them up). Weights are `u64` because merged edges sum
/// the weights of the edges they replace.
#[derive(Clone, Debug)]
pub struct WorkingGraph {
    nodes: Vec<NodeData>,
    edges: Vec<EdgeData>,
    live_nodes: usize,
    live_edges: usize,
}

impl WorkingGraph {
    pub fn new() -> Self {
        WorkingGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            live_nodes: 0,
            live_edges: 0,
        }
    }

    /// Copy the original instance. Node `i` of the input becomes the node with
    /// dense index `i`; edges are created in the order of [`Graph::edges`].
    pub fn from_graph(graph: &Graph) -> Self {
        let mut g = WorkingGraph::new();
        for _ in graph.node_indices() {
            g.add_node();
        }
        for (from, to, weight) in graph.edges() {
            g.add_edge(
                NodeId(from as u32),
                NodeId(to as u32),
                u64::from(weight),
            );
        }
        g
    }

    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            adj: Vec::new(),
            alive: true,
        });
        self.live_nodes += 1;
        id
    }

    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: u64) -> EdgeId {
        debug_assert!(self.node_alive(a) && self.node_alive(b));
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeData {
            a,
            b,
            weight,
            alive: true,
        });
        self.nodes[a.index()].adj.push(id);
        if a != b {
            self.nodes[b.index()].adj.push(id);
        }
        self.live_edges += 1;
        id
    }

    pub fn remove_edge(&mut self, edge: EdgeId) {
        debug_assert!(self.edge_alive(edge));
        let EdgeData { a, b, .. } = self.edges[edge.index()];
        self.nodes[a.index()].adj.retain(|&e| e != edge);
        if a != b {
            self.nodes[b.index()].adj.retain(|&e| e != edge);
        }
        self.edges[edge.index()].alive = false;
        self.live_edges -= 1;
    }

    /// Remove a node and all edges incident to it.
    pub fn remove_node(&mut self, node: NodeId) {
        debug_assert!(self.node_alive(node));
        let incident = self.nodes[node.index()].adj.clone();
        for edge in incident {
            if self.edge_alive(edge) {
                self.remove_edge(edge);
            }
        }
        self.nodes[node.index()].alive = false;
        self.live_nodes -= 1;
    }

    /// Re-attach the `from` endpoint of `edge` to `to`. Used by contractions;
    /// the edge keeps its identity (and thereby its provenance entry).
    pub fn move_endpoint(&mut self, edge: EdgeId, from: NodeId, to: NodeId) {
        debug_assert!(self.edge_alive(edge) && self.node_alive(to));
        if from == to {
            return;
        }
        let (a, b) = {
            let d = &self.edges[edge.index()];
            debug_assert!(d.a == from || d.b == from);
            (d.a, d.b)
        };
        // unlink from both old endpoints, then relink under the new ones;
        // this keeps the "a loop appears once" invariant in every case
        self.nodes[a.index()].adj.retain(|&e| e != edge);
        if b != a {
            self.nodes[b.index()].adj.retain(|&e| e != edge);
        }
        {
            let d = &mut self.edges[edge.index()];
            if d.a == from {
                d.a = to;
            } else {
                d.b = to;
            }
        }
        let (na, nb) = {
            let d = &self.edges[edge.index()];
            (d.a, d.b)
        };
        self.nodes[na.index()].adj.push(edge);
        if nb != na {
            self.nodes[nb.index()].adj.push(edge);
        }
    }

    pub fn node_alive(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.index())
            .map(|n| n.alive)
            .unwrap_or(false)
    }

    pub fn edge_alive(&self, edge: EdgeId) -> bool {
        self.edges
            .get(edge.index())
            .map(|e| e.alive)
            .unwrap_or(false)
    }

    pub fn endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        debug_assert!(self.edge_alive(edge));
        let e = &self.edges[edge.index()];
        (e.a, e.b)
    }

    pub fn other_endpoint(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let (a, b) = self.endpoints(edge);
        debug_assert!(a == node || b == node);
        if a == node {
            b
        } else {
            a
        }
    }

    pub fn is_loop(&self, edge: EdgeId) -> bool {
        let (a, b) = self.endpoints(edge);
        a == b
    }

    pub fn weight(&self, edge: EdgeId) -> u64 {
        debug_assert!(self.edge_alive(edge));
        self.edges[edge.index()].weight
    }

    pub fn distance(&self, edge: EdgeId) -> NaturalOrInfinite {
        NaturalOrInfinite::from_finite(self.weight(edge))
    }

    pub fn degree(&self, node: NodeId) -> usize {
        debug_assert!(self.node_alive(node));
        self.nodes[node.index()].adj.len()
    }

    /// Edges incident to `node`; a self-loop appears once.
    pub fn incident_edges(&self, node: NodeId) -> &[EdgeId] {
        debug_assert!(self.node_alive(node));
        &self.nodes[node.index()].adj
    }

    /// `(edge, other endpoint)` pairs for a node.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.incident_edges(node)
            .iter()
            .map(move |&e| (e, self.other_endpoint(e, node)))
    }

    pub fn num_nodes(&self) -> usize {
        self.live_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.live_edges
    }

    /// Upper bound (exclusive) on node dense indices, dead ones included.
    /// Side arrays of this length can be indexed by [`NodeId::index`].
    pub fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive)
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.alive)
            .map(|(i, _)| EdgeId(i as u32))
    }

    /// No self-loops, at most one edge per node pair.
    pub fn is_simple(&self) -> bool {
        let mut seen = HashMap::new();
        for e in self.edge_ids() {
            let (a, b) = self.endpoints(e);
            if a == b {
                return false;
            }
            if seen.insert(canonical_pair(a, b), e).is_some() {
                return false;
            }
        }
        true
    }

    pub fn is_connected(&self) -> bool {
        self.components().len() <= 1
    }

    /// Connected components of the live graph.
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut visited = vec![false; self.node_bound()];
        let mut components = Vec::new();
        for start in self.node_ids() {
            if visited[start.index()] {
                continue;
            }
            let mut component = vec![start];
            visited[start.index()] = true;
            let mut queue = vec![start];
            while let Some(v) = queue.pop() {
                for (_, u) in self.neighbors(v) {
                    if !visited[u.index()] {
                        visited[u.index()] = true;
                        component.push(u);
                        queue.push(u);
                    }
                }
            }
            components.push(component);
        }
        components
    }
}

impl Default for WorkingGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Unordered node pair as an ordered key, so `(a,b)` and `(b,a)` collide.
pub fn canonical_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    (a.min(b), a.max(b))
}
