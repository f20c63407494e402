use crate::working_graph::{EdgeId, NodeId};

/// Where a working-graph element comes from: a position in the original
/// instance, or an entry of the sons list describing what a synthesized
/// element replaced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Origin {
    Original(usize),
    Derived(usize),
}

/// A provenance reference together with the kind of element it refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ElementRef {
    Node(Origin),
    Edge(Origin),
}

/// The provenance forest: for every node and edge ever created in the working
/// graph, what it represents in the original instance.
///
/// The sons list is append-only and entries only ever reference strictly
/// earlier entries, so the forest is acyclic by construction. Violations are
/// internal-consistency bugs and fatal.
pub struct Provenance {
    original_nodes: usize,
    original_edges: usize,
    node_origin: Vec<Origin>,
    edge_origin: Vec<Origin>,
    sons: Vec<Vec<ElementRef>>,
}

impl Provenance {
    pub fn new(original_nodes: usize, original_edges: usize) -> Self {
        Provenance {
            original_nodes,
            original_edges,
            node_origin: (0..original_nodes).map(Origin::Original).collect(),
            edge_origin: (0..original_edges).map(Origin::Original).collect(),
            sons: Vec::new(),
        }
    }

    pub fn node_origin(&self, node: NodeId) -> Origin {
        self.node_origin[node.index()]
    }

    pub fn edge_origin(&self, edge: EdgeId) -> Origin {
        self.edge_origin[edge.index()]
    }

    /// Record a node synthesized by a reduction. Must be called right after
    /// the node was appended to the graph arena.
    pub fn register_node(&mut self, node: NodeId, sons: Vec<ElementRef>) {
        assert_eq!(
            node.index(),
            self.node_origin.len(),
            "provenance out of step with the node arena"
        );
        let origin = self.push_entry(sons);
        self.node_origin.push(origin);
    }

    pub fn register_edge(&mut self, edge: EdgeId, sons: Vec<ElementRef>) {
        assert_eq!(
            edge.index(),
            self.edge_origin.len(),
            "provenance out of step with the edge arena"
        );
        let origin = self.push_entry(sons);
        self.edge_origin.push(origin);
    }

    fn push_entry(&mut self, sons: Vec<ElementRef>) -> Origin {
        let entry = self.sons.len();
        for &child in &sons {
            self.check_reference(child, entry);
        }
        self.sons.push(sons);
        Origin::Derived(entry)
    }

    fn check_reference(&self, child: ElementRef, entry: usize) {
        let (origin, bound) = match child {
            ElementRef::Node(o) => (o, self.original_nodes),
            ElementRef::Edge(o) => (o, self.original_edges),
        };
        match origin {
            Origin::Original(i) => assert!(
                i < bound,
                "provenance references a nonexistent original element"
            ),
            Origin::Derived(d) => assert!(
                d < entry,
                "provenance entry {entry} references the later entry {d}"
            ),
        }
    }

    /// Resolve references down to the original node and edge positions they
    /// represent. Returns sorted, deduplicated position lists.
    pub fn expand(&self, roots: impl IntoIterator<Item = ElementRef>) -> (Vec<usize>, Vec<usize>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut seen_nodes = vec![false; self.original_nodes];
        let mut seen_edges = vec![false; self.original_edges];
        let mut visited = vec![false; self.sons.len()];
        let mut stack: Vec<ElementRef> = roots.into_iter().collect();
        while let Some(reference) = stack.pop() {
            match reference {
                ElementRef::Node(Origin::Original(i)) => {
                    assert!(i < self.original_nodes, "expansion hit an unknown node");
                    if !seen_nodes[i] {
                        seen_nodes[i] = true;
                        nodes.push(i);
                    }
                }
                ElementRef::Edge(Origin::Original(i)) => {
                    assert!(i < self.original_edges, "expansion hit an unknown edge");
                    if !seen_edges[i] {
                        seen_edges[i] = true;
                        edges.push(i);
                    }
                }
                ElementRef::Node(Origin::Derived(d)) | ElementRef::Edge(Origin::Derived(d)) => {
                    if !visited[d] {
                        visited[d] = true;
                        stack.extend(self.sons[d].iter().copied());
                    }
                }
            }
        }
        nodes.sort_unstable();
        edges.sort_unstable();
        (nodes, edges)
    }
}
