//! Structurally trivial reduction rules: leaves, multi-edges, degree-2
//! chains, terminal-free components.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::reduction::Reducer;
use crate::working_graph::{canonical_pair, EdgeId, NodeId};

impl Reducer {
    /// Remove degree-1 nodes until none are left. A non-terminal leaf can
    /// never be part of an optimal tree; a terminal leaf's only edge is in
    /// every feasible tree and is folded into the solution.
    pub fn delete_leaves(&mut self) -> bool {
        let mut changed = false;
        loop {
            let mut acted = false;
            let leaves: Vec<NodeId> = self
                .graph
                .node_ids()
                .filter(|&v| self.graph.degree(v) == 1)
                .collect();
            for v in leaves {
                if !self.graph.node_alive(v) || self.graph.degree(v) != 1 {
                    continue;
                }
                let e = self.graph.incident_edges(v)[0];
                if self.graph.is_loop(e) {
                    continue;
                }
                if !self.is_terminal(v) {
                    self.graph.remove_node(v);
                    acted = true;
                } else if self.terminals.len() > 1 {
                    self.contract_edge_into_solution(e);
                    acted = true;
                    break; // handles may be stale, re-collect
                }
            }
            changed |= acted;
            if !acted {
                break;
            }
        }
        changed
    }

    /// Drop self-loops and keep only the cheapest edge of every parallel
    /// bundle (ties keep the earliest).
    pub fn make_simple(&mut self) -> bool {
        let mut best: HashMap<(NodeId, NodeId), EdgeId> = HashMap::new();
        let mut victims = Vec::new();
        for e in self.graph.edge_ids() {
            let (a, b) = self.graph.endpoints(e);
            if a == b {
                victims.push(e);
                continue;
            }
            match best.entry(canonical_pair(a, b)) {
                Entry::Occupied(mut kept) => {
                    if self.graph.weight(e) < self.graph.weight(*kept.get()) {
                        victims.push(*kept.get());
                        kept.insert(e);
                    } else {
                        victims.push(e);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(e);
                }
            }
        }
        for e in &victims {
            self.graph.remove_edge(*e);
        }
        !victims.is_empty()
    }

    /// Replace each degree-2 non-terminal by a single merged edge between its
    /// neighbors. A chain closing back on itself is dropped entirely (a cycle
    /// never helps a tree).
    pub fn degree2_test(&mut self) -> bool {
        let mut changed = false;
        loop {
            let mut acted = false;
            let candidates: Vec<NodeId> = self
                .graph
                .node_ids()
                .filter(|&v| !self.is_terminal(v) && self.graph.degree(v) == 2)
                .collect();
            for v in candidates {
                if !self.graph.node_alive(v)
                    || self.is_terminal(v)
                    || self.graph.degree(v) != 2
                {
                    continue;
                }
                let incident = self.graph.incident_edges(v);
                let (e1, e2) = (incident[0], incident[1]);
                if self.graph.is_loop(e1) || self.graph.is_loop(e2) {
                    continue; // cleared by make_simple first
                }
                let a = self.graph.other_endpoint(e1, v);
                let b = self.graph.other_endpoint(e2, v);
                let weight = self.graph.weight(e1) + self.graph.weight(e2);
                if a == b {
                    self.graph.remove_node(v);
                } else {
                    let sons = vec![
                        self.edge_ref(e1),
                        self.node_ref(v),
                        self.edge_ref(e2),
                    ];
                    self.graph.remove_node(v);
                    self.add_derived_edge(a, b, weight, sons);
                }
                acted = true;
            }
            changed |= acted;
            if !acted {
                break;
            }
        }
        changed
    }

    /// Delete every connected component that contains no terminal.
    pub fn delete_components_without_terminals(&mut self) -> bool {
        let mut changed = false;
        for component in self.graph.components() {
            if component.iter().any(|&v| self.is_terminal(v)) {
                continue;
            }
            for v in component {
                self.graph.remove_node(v);
            }
            changed = true;
        }
        changed
    }

    /// Degenerate instance: with at most one terminal the empty tree is
    /// optimal, so everything except that terminal can go.
    pub fn collapse_to_single_terminal(&mut self) -> bool {
        debug_assert!(self.terminals.len() <= 1);
        let keep = self.terminals.first().copied();
        let victims: Vec<NodeId> = self
            .graph
            .node_ids()
            .filter(|&v| Some(v) != keep)
            .collect();
        let mut changed = !victims.is_empty();
        for v in victims {
            self.graph.remove_node(v);
        }
        let loops: Vec<EdgeId> = self.graph.edge_ids().collect();
        changed |= !loops.is_empty();
        for e in loops {
            self.graph.remove_edge(e);
        }
        changed
    }
}
