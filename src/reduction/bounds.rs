//! Bound-based reduction rules: elements are deleted when a lower bound on
//! every solution using them exceeds what is achievable without them.

use std::collections::HashMap;

use crate::closest_terminals::ClosestTerminals;
use crate::decomposition::HeavyPathDecomposition;
use crate::reduction::{Reducer, DETOUR_BUDGET};
use crate::shortest_paths::{detour_within, DistanceMatrix};
use crate::util::NaturalOrInfinite;
use crate::voronoi::{
    network_mst, terminal_distance_network, terminal_spanning_tree, VoronoiPartition,
};
use crate::working_graph::{EdgeId, NodeId};

impl Reducer {
    /// An upper bound on the bottleneck Steiner distance between `u` and `v`:
    /// the best of the decomposition query (when both nodes lie in the
    /// spanning tree) and detours through close terminals of either side.
    fn bottleneck_upper_bound(
        &self,
        u: NodeId,
        v: NodeId,
        hpd: &HeavyPathDecomposition,
        closest: &ClosestTerminals,
    ) -> NaturalOrInfinite {
        let mut bound = NaturalOrInfinite::infinity();
        if let Some(b) = hpd.bottleneck_steiner_distance(u, v) {
            bound = bound.min(b);
        }
        for &(t1, d1) in closest.closest(u) {
            for &(t2, d2) in closest.closest(v) {
                let via = if t1 == t2 {
                    d1.max(d2)
                } else {
                    match hpd.bottleneck_steiner_distance(t1, t2) {
                        Some(b) => d1.max(d2).max(b),
                        None => continue,
                    }
                };
                bound = bound.min(via);
            }
        }
        bound
    }

    /// Delete every edge strictly heavier than an upper bound on the
    /// bottleneck Steiner distance between its endpoints. Any tree using such
    /// an edge can swap it for the cheaper bottleneck path.
    pub fn ptm_test(&mut self, k: usize) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let Some(tree) = terminal_spanning_tree(&self.graph, &self.terminals) else {
            return false;
        };
        let hpd = HeavyPathDecomposition::build(&tree);
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, k);
        let victims: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|&e| !self.graph.is_loop(e))
            .filter(|&e| {
                let (u, v) = self.graph.endpoints(e);
                self.graph.distance(e) > self.bottleneck_upper_bound(u, v, &hpd, &closest)
            })
            .collect();
        for &e in &victims {
            log::trace!("bottleneck test deletes {e:?}");
            self.graph.remove_edge(e);
        }
        !victims.is_empty()
    }

    /// Non-terminal degree test: a non-terminal `v` of small degree can be
    /// deleted when, for every subset of at least three neighbors, a spanning
    /// tree under the bottleneck bounds is no more expensive than the star of
    /// incident edges. Pairwise connections through `v` are preserved by
    /// inserting a merged edge per neighbor pair.
    pub fn ntdk_test(&mut self, max_degree: usize, k: usize) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let Some(tree) = terminal_spanning_tree(&self.graph, &self.terminals) else {
            return false;
        };
        let hpd = HeavyPathDecomposition::build(&tree);
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, k);
        let candidates: Vec<NodeId> = self
            .graph
            .node_ids()
            .filter(|&v| {
                !self.is_terminal(v) && (3..=max_degree).contains(&self.graph.degree(v))
            })
            .collect();
        let mut changed = false;
        for v in candidates {
            if !self.graph.node_alive(v)
                || !(3..=max_degree).contains(&self.graph.degree(v))
            {
                continue;
            }
            let neighbors: Vec<(EdgeId, NodeId)> = self.graph.neighbors(v).collect();
            // loops and parallel bundles are make_simple's business
            let distinct = neighbors.iter().all(|&(_, u)| u != v)
                && (1..neighbors.len())
                    .all(|i| neighbors[..i].iter().all(|&(_, u)| u != neighbors[i].1));
            if !distinct {
                continue;
            }
            let d = neighbors.len();
            let mut bottleneck = vec![NaturalOrInfinite::infinity(); d * d];
            for i in 0..d {
                for j in (i + 1)..d {
                    let b = self.bottleneck_upper_bound(
                        neighbors[i].1,
                        neighbors[j].1,
                        &hpd,
                        &closest,
                    );
                    bottleneck[i * d + j] = b;
                    bottleneck[j * d + i] = b;
                }
            }
            let star_weights: Vec<u64> =
                neighbors.iter().map(|&(e, _)| self.graph.weight(e)).collect();
            let replaceable = (0usize..1 << d)
                .filter(|mask| mask.count_ones() >= 3)
                .all(|mask| {
                    let members: Vec<usize> = (0..d).filter(|i| mask & (1 << i) != 0).collect();
                    let star: NaturalOrInfinite = members
                        .iter()
                        .map(|&i| NaturalOrInfinite::from_finite(star_weights[i]))
                        .sum();
                    subset_spanning_cost(&members, &bottleneck, d) <= star
                });
            if !replaceable {
                continue;
            }
            for i in 0..d {
                for j in (i + 1)..d {
                    let (ei, ui) = neighbors[i];
                    let (ej, uj) = neighbors[j];
                    let sons = vec![self.edge_ref(ei), self.node_ref(v), self.edge_ref(ej)];
                    self.add_derived_edge(ui, uj, star_weights[i] + star_weights[j], sons);
                }
            }
            log::trace!("degree test deletes {v:?}");
            self.graph.remove_node(v);
            changed = true;
        }
        changed
    }

    /// Delete every edge strictly heavier than the most expensive bridge of
    /// the terminal network MST. A tree using a heavier edge could cross the
    /// corresponding region cut over the bridge instead.
    pub fn terminal_distance_test(&mut self) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let vor = VoronoiPartition::compute(&self.graph, &self.terminals);
        let bridges = terminal_distance_network(&self.graph, &vor);
        let mst = network_mst(&bridges, &self.terminals);
        if mst.len() + 1 < self.terminals.len() {
            return false;
        }
        let Some(max_bridge) = mst.iter().map(|b| b.cost).max() else {
            return false;
        };
        let victims: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|&e| self.graph.distance(e) > max_bridge)
            .collect();
        for &e in &victims {
            log::trace!("terminal distance test deletes {e:?}");
            self.graph.remove_edge(e);
        }
        !victims.is_empty()
    }

    /// Voronoi-region lower bounds against a known upper bound.
    ///
    /// Every solution through a non-terminal `v` pays at least the distances
    /// from `v` to its two closest terminals plus, for `k` terminals, the
    /// `k - 2` smallest region radii (each remaining terminal still has to be
    /// reached from outside its region). The edge variant charges only the
    /// edge plus both endpoint-to-seed distances: deleting the edge from a
    /// minimal tree leaves two components, each of which contains a terminal
    /// of its side. No region radii are added on top since the seed paths may
    /// already cross other regions.
    pub fn lower_bound_based_test(&mut self, upper_bound: NaturalOrInfinite) -> bool {
        let k = self.terminals.len();
        if k < 2 {
            return false;
        }
        let vor = VoronoiPartition::compute(&self.graph, &self.terminals);
        let mut radius: HashMap<NodeId, NaturalOrInfinite> = self
            .terminals
            .iter()
            .map(|&t| (t, NaturalOrInfinite::infinity()))
            .collect();
        for e in self.graph.edge_ids() {
            let (x, y) = self.graph.endpoints(e);
            let (Some(t1), Some(t2)) = (vor.seed(x), vor.seed(y)) else {
                continue;
            };
            if t1 == t2 {
                continue;
            }
            let from_x = vor.distance(x) + self.graph.distance(e);
            let from_y = vor.distance(y) + self.graph.distance(e);
            let r1 = radius.get_mut(&t1).expect("seeds are terminals");
            *r1 = (*r1).min(from_x);
            let r2 = radius.get_mut(&t2).expect("seeds are terminals");
            *r2 = (*r2).min(from_y);
        }
        let mut radii: Vec<NaturalOrInfinite> = radius.into_values().collect();
        if radii.iter().any(|r| !r.is_finite()) {
            return false;
        }
        radii.sort_unstable();
        let base: NaturalOrInfinite = radii[..k - 2].iter().copied().sum();
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, 2);
        let node_victims: Vec<NodeId> = self
            .graph
            .node_ids()
            .filter(|&v| !self.is_terminal(v))
            .filter(|&v| {
                let list = closest.closest(v);
                list.len() == 2 && list[0].1 + list[1].1 + base > upper_bound
            })
            .collect();
        let edge_victims: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|&e| {
                let (x, y) = self.graph.endpoints(e);
                match (vor.seed(x), vor.seed(y)) {
                    (Some(t1), Some(t2)) if t1 != t2 => {
                        vor.distance(x) + self.graph.distance(e) + vor.distance(y) > upper_bound
                    }
                    _ => false,
                }
            })
            .collect();
        let mut changed = false;
        for &v in &node_victims {
            log::trace!("lower bound test deletes {v:?}");
            self.graph.remove_node(v);
            changed = true;
        }
        for &e in &edge_victims {
            if self.graph.edge_alive(e) {
                log::trace!("lower bound test deletes {e:?}");
                self.graph.remove_edge(e);
                changed = true;
            }
        }
        changed
    }

    /// Delete non-terminals whose two closest terminals are together further
    /// away than the upper bound: any tree through such a node contains two
    /// disjoint branches down to distinct terminals. Nodes with fewer than two
    /// reachable terminals are left alone.
    pub fn reachability_test(&mut self, upper_bound: NaturalOrInfinite) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, 2);
        let victims: Vec<NodeId> = self
            .graph
            .node_ids()
            .filter(|&v| !self.is_terminal(v))
            .filter(|&v| {
                let list = closest.closest(v);
                list.len() == 2 && list[0].1 + list[1].1 > upper_bound
            })
            .collect();
        for &v in &victims {
            log::trace!("reachability test deletes {v:?}");
            self.graph.remove_node(v);
        }
        if victims.is_empty() {
            return false;
        }
        self.degree2_test();
        true
    }

    /// The edge variant of the reachability argument: a tree using edge
    /// `(x, y)` pays the edge plus connections from both sides to distinct
    /// terminals.
    pub fn cut_reachability_test(&mut self, upper_bound: NaturalOrInfinite) -> bool {
        if self.terminals.len() < 2 {
            return false;
        }
        let closest = ClosestTerminals::compute(&self.graph, &self.terminals, 2);
        let victims: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|&e| !self.graph.is_loop(e))
            .filter(|&e| {
                let (x, y) = self.graph.endpoints(e);
                let mut best = NaturalOrInfinite::infinity();
                for &(tx, dx) in closest.closest(x) {
                    for &(ty, dy) in closest.closest(y) {
                        if tx != ty {
                            best = best.min(dx + dy);
                        }
                    }
                }
                best.is_finite() && self.graph.distance(e) + best > upper_bound
            })
            .collect();
        for &e in &victims {
            log::trace!("cut reachability test deletes {e:?}");
            self.graph.remove_edge(e);
        }
        if victims.is_empty() {
            return false;
        }
        self.degree2_test();
        true
    }

    /// Delete every edge with a strictly shorter path between its endpoints.
    pub fn least_cost_test(&mut self) -> bool {
        let matrix = DistanceMatrix::new(&self.graph);
        let victims: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|&e| {
                let (u, v) = self.graph.endpoints(e);
                u != v && matrix[u.index()][v.index()] < self.graph.distance(e)
            })
            .collect();
        for &e in &victims {
            log::trace!("least cost test deletes {e:?}");
            self.graph.remove_edge(e);
        }
        !victims.is_empty()
    }

    /// Delete edges that have a detour of at most their own weight. The
    /// detour is searched in the live graph after each deletion, so two
    /// equal-cost alternatives can never justify removing each other.
    pub fn long_edges_test(&mut self) -> bool {
        let mut changed = false;
        let edges: Vec<EdgeId> = self.graph.edge_ids().collect();
        for e in edges {
            if !self.graph.edge_alive(e) || self.graph.is_loop(e) {
                continue;
            }
            let (a, b) = self.graph.endpoints(e);
            if detour_within(
                &self.graph,
                a,
                b,
                e,
                self.graph.distance(e),
                DETOUR_BUDGET,
            ) {
                log::trace!("long edge test deletes {e:?}");
                self.graph.remove_edge(e);
                changed = true;
            }
        }
        changed
    }
}

/// Cost of a spanning tree (Prim) over `members` under the pairwise
/// bottleneck bounds; unreachable members drive the cost to infinity.
fn subset_spanning_cost(
    members: &[usize],
    bottleneck: &[NaturalOrInfinite],
    d: usize,
) -> NaturalOrInfinite {
    let mut in_tree = vec![false; members.len()];
    in_tree[0] = true;
    let mut total = NaturalOrInfinite::from(0);
    for _ in 1..members.len() {
        let mut best: Option<(NaturalOrInfinite, usize)> = None;
        for (i, &m) in members.iter().enumerate() {
            if in_tree[i] {
                continue;
            }
            for (j, &n) in members.iter().enumerate() {
                if !in_tree[j] {
                    continue;
                }
                let b = bottleneck[m * d + n];
                if best.map_or(true, |(cost, _)| b < cost) {
                    best = Some((b, i));
                }
            }
        }
        let (cost, i) = best.expect("at least one member is outside the tree");
        total = total + cost;
        in_tree[i] = true;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{shortcut_test_graph, small_test_graph, terminal_star};
    use crate::graph::Graph;
    use crate::steiner_tree::DreyfusWagner;
    use crate::util::TestResult;

    /// Two terminals joined by a cheap two-edge path and an expensive one.
    fn parallel_paths() -> Result<Graph, crate::graph::ParseError> {
        "SECTION Graph\n\
        Nodes 4\n\
        Edges 4\n\
        E 1 3 1\n\
        E 3 2 1\n\
        E 1 4 10\n\
        E 4 2 10\n\
        END\n\
        SECTION Terminals\n\
        Terminals 2\n\
        T 1\n\
        T 2\n\
        END\n\
        EOF\n"
            .parse()
    }

    #[test]
    fn test_ptm_deletes_dominated_edges() -> TestResult {
        let graph = shortcut_test_graph()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.ptm_test(3));
        // both the weight-7 shortcut and the weight-4 edge have cheaper
        // bottleneck connections
        assert_eq!(reducer.graph().num_edges(), 3);
        let max: u64 = reducer
            .graph()
            .edge_ids()
            .map(|e| reducer.graph().weight(e))
            .max()
            .unwrap();
        assert_eq!(max, 2);
        Ok(())
    }

    #[test]
    fn test_ntdk_deletes_redundant_center() -> TestResult {
        // terminals form a cheap triangle; the non-terminal center star is
        // never needed
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 6\n\
            E 1 2 2\n\
            E 2 3 2\n\
            E 1 3 2\n\
            E 1 4 3\n\
            E 2 4 3\n\
            E 3 4 3\n\
            END\n\
            SECTION Terminals\n\
            Terminals 3\n\
            T 1\n\
            T 2\n\
            T 3\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.ntdk_test(4, 3));
        assert_eq!(reducer.graph().num_nodes(), 3);
        // one merged edge per neighbor pair was inserted
        assert_eq!(reducer.graph().num_edges(), 6);
        assert!(reducer.make_simple());
        assert_eq!(reducer.graph().num_edges(), 3);
        Ok(())
    }

    #[test]
    fn test_ntdk_keeps_needed_center() -> TestResult {
        // the star center is the only connection between the terminals
        let graph = terminal_star()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(!reducer.ntdk_test(4, 3));
        assert_eq!(reducer.graph().num_nodes(), 5);
        Ok(())
    }

    #[test]
    fn test_terminal_distance_deletes_heavy_edges() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 3\n\
            Edges 3\n\
            E 1 2 1\n\
            E 1 3 5\n\
            E 3 2 5\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 2\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.terminal_distance_test());
        // the most expensive network bridge costs 1, both weight-5 edges go
        assert_eq!(reducer.graph().num_edges(), 1);
        Ok(())
    }

    #[test]
    fn test_lower_bound_deletes_distant_node() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 4\n\
            Edges 4\n\
            E 1 3 1\n\
            E 3 2 1\n\
            E 1 4 50\n\
            E 4 2 60\n\
            END\n\
            SECTION Terminals\n\
            Terminals 2\n\
            T 1\n\
            T 2\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.lower_bound_based_test(2.into()));
        // the decoy is unaffordable, the path node is exactly on the bound
        assert_eq!(reducer.graph().num_nodes(), 3);
        assert_eq!(reducer.graph().num_edges(), 2);
        Ok(())
    }

    #[test]
    fn test_lower_bound_keeps_forced_terminal_edge() -> TestResult {
        // terminal 5 hangs off node 1 by a single weight-9 edge, so every
        // solution uses that edge; its bound must stay at or below the
        // optimum of 38
        let graph: Graph = "SECTION Graph\n\
            Nodes 11\n\
            Edges 11\n\
            E 1 2 1\n\
            E 1 5 9\n\
            E 1 6 5\n\
            E 2 3 6\n\
            E 2 4 8\n\
            E 2 7 3\n\
            E 2 8 3\n\
            E 4 6 2\n\
            E 6 10 7\n\
            E 8 9 5\n\
            E 9 11 3\n\
            END\n\
            SECTION Terminals\n\
            Terminals 5\n\
            T 3\n\
            T 4\n\
            T 5\n\
            T 9\n\
            T 10\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.lower_bound_based_test(38.into()));
        // only the dangling non-terminal 7 is unaffordable; the forced edge
        // and both branches of the solution survive
        assert_eq!(reducer.graph().num_nodes(), 10);
        assert_eq!(reducer.graph().num_edges(), 10);
        let (total, solution) = reducer.solve(&DreyfusWagner);
        assert_eq!(total, 38.into());
        assert_eq!(solution.weight, 38.into());
        Ok(())
    }

    #[test]
    fn test_reachability_deletes_and_cleans_up() -> TestResult {
        let graph = parallel_paths()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.reachability_test(2.into()));
        // the expensive side is deleted, the cheap chain is merged
        assert_eq!(reducer.graph().num_nodes(), 2);
        assert_eq!(reducer.graph().num_edges(), 1);
        let e = reducer.graph().edge_ids().next().unwrap();
        assert_eq!(reducer.graph().weight(e), 2);
        Ok(())
    }

    #[test]
    fn test_cut_reachability_deletes_edges() -> TestResult {
        let graph = parallel_paths()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.cut_reachability_test(2.into()));
        // both expensive edges go; their endpoint stays behind isolated
        assert_eq!(reducer.graph().num_edges(), 1);
        assert_eq!(reducer.graph().num_nodes(), 3);
        Ok(())
    }

    #[test]
    fn test_least_cost_deletes_shortcuts() -> TestResult {
        let graph = shortcut_test_graph()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.least_cost_test());
        assert_eq!(reducer.graph().num_edges(), 3);
        assert!(!reducer.least_cost_test());
        Ok(())
    }

    #[test]
    fn test_long_edges_deletes_equal_detour() -> TestResult {
        let graph = small_test_graph()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.long_edges_test());
        // the weight-3 edge has an equal-cost detour over the other two
        assert_eq!(reducer.graph().num_edges(), 2);
        assert!(!reducer.long_edges_test());
        Ok(())
    }
}
