//! Rules that prove an edge is part of some optimal tree and contract it,
//! merging its endpoints into a fresh terminal.

use std::collections::HashMap;

use crate::closest_terminals::ClosestTerminals;
use crate::reduction::Reducer;
use crate::util::NaturalOrInfinite;
use crate::voronoi::VoronoiPartition;
use crate::working_graph::{EdgeId, NodeId};

impl Reducer {
    /// Contract `edge` into the solution: its endpoints merge into a new
    /// terminal, its weight moves to `cost_inserted`, and the provenance of
    /// the merged node covers both endpoints and the edge. Incident edges are
    /// re-pointed at the merged node and keep their identity; edges that
    /// become self-loops are dropped.
    pub(super) fn contract_edge_into_solution(&mut self, edge: EdgeId) {
        debug_assert!(self.graph.edge_alive(edge) && !self.graph.is_loop(edge));
        let (a, b) = self.graph.endpoints(edge);
        let weight = self.graph.weight(edge);
        log::trace!("contracting {edge:?} (weight {weight}) into the solution");
        let sons = vec![self.node_ref(a), self.node_ref(b), self.edge_ref(edge)];
        let merged = self.add_derived_node(sons);
        for v in [a, b] {
            let incident: Vec<EdgeId> = self.graph.incident_edges(v).to_vec();
            for e in incident {
                if e == edge || !self.graph.edge_alive(e) {
                    continue;
                }
                if self.graph.is_loop(e) {
                    self.graph.remove_edge(e);
                    continue;
                }
                self.graph.move_endpoint(e, v, merged);
            }
        }
        let loops: Vec<EdgeId> = self
            .graph
            .incident_edges(merged)
            .iter()
            .copied()
            .filter(|&e| self.graph.is_loop(e))
            .collect();
        for e in loops {
            self.graph.remove_edge(e);
        }
        self.graph.remove_edge(edge);
        self.set_terminal(a, false);
        self.set_terminal(b, false);
        self.graph.remove_node(a);
        self.graph.remove_node(b);
        self.set_terminal(merged, true);
        self.cost_inserted += weight;
    }

    /// Nearest vertex rule: for a terminal `z` with cheapest incident edge
    /// `e1 = (z, u)` and second-cheapest `e2`, the edge `e1` is in some
    /// optimal tree whenever `w(e1) + d(u, T \ {z}) <= w(e2)` (any tree
    /// connecting `z` over another edge pays at least `w(e2)` and can be
    /// rerouted through `e1` instead).
    pub fn nearest_vertex_test(&mut self) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, 2);
        let candidates: Vec<(NodeId, EdgeId)> = self
            .terminals
            .iter()
            .filter_map(|&z| self.nearest_vertex_candidate(z, &closest).map(|e| (z, e)))
            .collect();
        let mut changed = false;
        for (z, e) in candidates {
            if !self.graph.node_alive(z) || !self.is_terminal(z) || !self.graph.edge_alive(e) {
                continue;
            }
            // distances only shrink under contraction, so re-checking against
            // the stale table stays on the safe side
            if self.nearest_vertex_candidate(z, &closest) == Some(e) {
                self.contract_edge_into_solution(e);
                changed = true;
            }
        }
        changed
    }

    fn nearest_vertex_candidate(
        &self,
        z: NodeId,
        closest: &ClosestTerminals,
    ) -> Option<EdgeId> {
        let mut cheapest: Option<(u64, EdgeId)> = None;
        let mut second: Option<u64> = None;
        for &e in self.graph.incident_edges(z) {
            if self.graph.is_loop(e) {
                continue;
            }
            let w = self.graph.weight(e);
            match cheapest {
                None => cheapest = Some((w, e)),
                Some((best, _)) if w < best => {
                    second = Some(best);
                    cheapest = Some((w, e));
                }
                Some(_) => {
                    second = Some(second.map_or(w, |s| s.min(w)));
                }
            }
        }
        let (w1, e1) = cheapest?;
        // a terminal with a single incident edge contracts it unconditionally
        let second = second.map_or(NaturalOrInfinite::infinity(), NaturalOrInfinite::from_finite);
        let u = self.graph.other_endpoint(e1, z);
        let to_other = closest
            .closest(u)
            .iter()
            .find(|&&(t, _)| t != z)
            .map(|&(_, d)| d)?;
        if NaturalOrInfinite::from_finite(w1) + to_other <= second {
            Some(e1)
        } else {
            None
        }
    }

    /// Short links rule: the edges leaving a terminal's Voronoi region form a
    /// cut every feasible tree must cross. Let `e* = (x, y)` minimize the
    /// bridge value `vd(x) + w + vd(y)` over the cut. If that value is at
    /// most the plain weight of every other cut edge, swapping any crossing
    /// for `e*` plus the two Voronoi paths never costs extra, so `e*` is in
    /// some optimal tree. A single-edge cut is crossed by every tree
    /// unconditionally.
    ///
    /// Contracts at most one edge per call; the fixed-point loop recomputes
    /// the partition before the next one.
    pub fn short_links_test(&mut self) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let vor = VoronoiPartition::compute(&self.graph, &self.terminals);
        let mut leaving: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        for e in self.graph.edge_ids() {
            let (x, y) = self.graph.endpoints(e);
            let (Some(t1), Some(t2)) = (vor.seed(x), vor.seed(y)) else {
                continue;
            };
            if t1 == t2 {
                continue;
            }
            leaving.entry(t1).or_default().push(e);
            leaving.entry(t2).or_default().push(e);
        }
        let bridge_value = |e: EdgeId| {
            let (x, y) = self.graph.endpoints(e);
            vor.distance(x) + self.graph.distance(e) + vor.distance(y)
        };
        let mut chosen: Option<(NaturalOrInfinite, EdgeId)> = None;
        for edges in leaving.values() {
            let &best = edges
                .iter()
                .min_by_key(|&&e| (bridge_value(e), e))
                .expect("leaving lists are never empty");
            let value = bridge_value(best);
            let min_other = edges
                .iter()
                .filter(|&&e| e != best)
                .map(|&e| self.graph.distance(e))
                .min();
            let applies = match min_other {
                None => true, // forced crossing
                Some(other) => value <= other,
            };
            if applies && chosen.map(|(v, e)| (value, best) < (v, e)).unwrap_or(true) {
                chosen = Some((value, best));
            }
        }
        if let Some((_, e)) = chosen {
            self.contract_edge_into_solution(e);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::util::TestResult;

    fn node(i: usize, reducer: &Reducer) -> NodeId {
        reducer.graph().node_ids().nth(i).unwrap()
    }

    #[test]
    fn test_contract_merges_endpoints() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 4\n\
            E 1 2 2\n\
            E 2 3 3\n\
            E 1 3 4\n\
            E 3 4 5\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 4\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        let z = node(0, &reducer);
        let e = reducer
            .graph()
            .incident_edges(z)
            .iter()
            .copied()
            .find(|&e| reducer.graph().weight(e) == 2)
            .unwrap();
        reducer.contract_edge_into_solution(e);
        assert_eq!(reducer.cost_inserted(), 2);
        assert_eq!(reducer.graph().num_nodes(), 3);
        // the two 1-3 / 2-3 connections survive as parallel edges at the
        // merged node
        assert_eq!(reducer.graph().num_edges(), 3);
        assert!(!reducer.graph().is_simple());
        assert_eq!(reducer.terminals().len(), 2);
        Ok(())
    }

    #[test]
    fn test_nearest_vertex_contracts_cheap_edge() -> TestResult {
        // terminal 1 has edges of weight 1 and 10; its weight-1 neighbor is
        // one step from terminal 3, so 1 + 1 <= 10 forces the cheap edge
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 4\n\
            E 1 2 1\n\
            E 2 3 1\n\
            E 1 4 10\n\
            E 4 3 10\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 3\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.nearest_vertex_test());
        assert!(reducer.cost_inserted() >= 1);
        Ok(())
    }

    #[test]
    fn test_nearest_vertex_skips_unclear_terminals() -> TestResult {
        // both incident edges weigh the same and the detour is long; nothing
        // may be contracted
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 4\n\
            E 1 2 5\n\
            E 1 3 5\n\
            E 2 4 5\n\
            E 3 4 5\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 4\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(!reducer.nearest_vertex_test());
        assert_eq!(reducer.cost_inserted(), 0);
        Ok(())
    }

    #[test]
    fn test_short_links_contracts_forced_bridge() -> TestResult {
        // the single edge between the two halves is a forced crossing
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 3\n\
            E 1 2 1\n\
            E 2 3 7\n\
            E 3 4 1\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 4\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.short_links_test());
        assert_eq!(reducer.cost_inserted(), 7);
        Ok(())
    }

    #[test]
    fn test_short_links_needs_two_terminals() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 2\n\
            Edges 1\n\
            E 1 2 1\n\
            END\n\
            SECTION Terminals\n\
            Terminals 1\n\
            T 1\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(!reducer.short_links_test());
        Ok(())
    }
}
