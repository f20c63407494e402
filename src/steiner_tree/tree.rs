use std::collections::HashSet;

use crate::util::NaturalOrInfinite;
use crate::working_graph::{EdgeId, NodeId, WorkingGraph};

/// A tree (or forest) given by a set of edges of a [`WorkingGraph`]. Keyed by
/// edge identity rather than endpoint pairs so that parallel edges stay
/// distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeTree {
    edges: HashSet<EdgeId>,
}

impl EdgeTree {
    pub fn empty() -> Self {
        Self {
            edges: HashSet::new(),
        }
    }

    pub fn insert(&mut self, edge: EdgeId) -> bool {
        self.edges.insert(edge)
    }

    pub fn contains(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    /// The nodes touched by the tree's edges.
    pub fn nodes(&self, graph: &WorkingGraph) -> HashSet<NodeId> {
        self.edges
            .iter()
            .flat_map(|&e| {
                let (a, b) = graph.endpoints(e);
                [a, b]
            })
            .collect()
    }

    pub fn weight_in(&self, graph: &WorkingGraph) -> NaturalOrInfinite {
        self.edges.iter().map(|&e| graph.distance(e)).sum()
    }
}
