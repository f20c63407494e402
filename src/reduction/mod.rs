//! The instance reduction engine.
//!
//! [`Reducer`] owns a mutable copy of the instance and applies
//! correctness-preserving reduction rules from the Duin-Volgenant and
//! Polzin-Daneshmand literature: elements provably useless to every optimal
//! Steiner tree are deleted, elements provably in some optimal tree are
//! contracted into the solution. A provenance forest records what every
//! surviving element stands for, so a solution of the reduced instance can be
//! expanded back to the original graph without loss.

mod basic;
mod bounds;
mod contraction;
mod provenance;

pub use provenance::{ElementRef, Provenance};

use thiserror::Error;

use crate::graph::{EdgeWeight, Graph, NodeIndex};
use crate::steiner_tree::{EdgeTree, SteinerSolver, TakahashiMatsuyama};
use crate::util::NaturalOrInfinite;
use crate::working_graph::{EdgeId, NodeId, WorkingGraph};

/// Closest-terminal list length used by the bound-based tests.
const DEFAULT_K: usize = 3;
/// Largest non-terminal degree the degree test expands subsets for.
const DEFAULT_MAX_DEGREE: usize = 4;
/// Per-side settled-node budget of the bounded detour search.
const DETOUR_BUDGET: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("the instance has no terminals")]
    NoTerminals,
}

/// A solution expressed in terms of the original instance: positions of nodes
/// and edges (as defined by [`Graph::edges`] order) plus the total weight of
/// the listed edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalSolution {
    pub nodes: Vec<NodeIndex>,
    pub edges: Vec<usize>,
    pub weight: NaturalOrInfinite,
}

pub struct Reducer {
    graph: WorkingGraph,
    terminals: Vec<NodeId>,
    is_terminal: Vec<bool>,
    /// Total weight of edges already contracted into the solution.
    cost_inserted: u64,
    provenance: Provenance,
    original_edges: Vec<(NodeIndex, NodeIndex, EdgeWeight)>,
    upper_bound_solver: Box<dyn SteinerSolver>,
}

impl Reducer {
    pub fn new(original: &Graph) -> Result<Self, InstanceError> {
        if original.num_terminals() == 0 {
            return Err(InstanceError::NoTerminals);
        }
        let graph = WorkingGraph::from_graph(original);
        let ids: Vec<NodeId> = graph.node_ids().collect();
        let mut is_terminal = vec![false; graph.node_bound()];
        let mut terminals = Vec::with_capacity(original.num_terminals());
        for &t in original.terminals() {
            is_terminal[t] = true;
            terminals.push(ids[t]);
        }
        let original_edges: Vec<_> = original.edges().collect();
        let provenance = Provenance::new(original.num_nodes(), original_edges.len());
        Ok(Reducer {
            graph,
            terminals,
            is_terminal,
            cost_inserted: 0,
            provenance,
            original_edges,
            upper_bound_solver: Box::new(TakahashiMatsuyama),
        })
    }

    /// Replace the heuristic used to compute upper bounds during reduction.
    pub fn set_upper_bound_solver(&mut self, solver: Box<dyn SteinerSolver>) {
        self.upper_bound_solver = solver;
    }

    pub fn graph(&self) -> &WorkingGraph {
        &self.graph
    }

    pub fn terminals(&self) -> &[NodeId] {
        &self.terminals
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.is_terminal[node.index()]
    }

    pub fn cost_inserted(&self) -> u64 {
        self.cost_inserted
    }

    /// Repeats the structurally trivial rules to a fixed point.
    pub fn reduce_trivial(&mut self) -> bool {
        let mut changed = false;
        loop {
            let mut acted = false;
            acted |= self.delete_leaves();
            acted |= self.make_simple();
            acted |= self.degree2_test();
            acted |= self.delete_components_without_terminals();
            changed |= acted;
            if !acted {
                break;
            }
        }
        changed
    }

    /// Fixed-point loop over the full rule set. Rules whose preconditions are
    /// simplicity or leaf-freedom are run after re-establishing them.
    pub fn reduce_fast(&mut self) -> bool {
        let mut changed = self.reduce_trivial();
        loop {
            if self.terminals.len() <= 1 {
                changed |= self.collapse_to_single_terminal();
                return changed;
            }
            let mut acted = false;
            acted |= self.ptm_test(DEFAULT_K);
            acted |= self.reduce_trivial();
            acted |= self.ntdk_test(DEFAULT_MAX_DEGREE, DEFAULT_K);
            acted |= self.reduce_trivial();
            acted |= self.nearest_vertex_test();
            acted |= self.short_links_test();
            acted |= self.reduce_trivial();
            if self.terminals.len() >= 2 {
                acted |= self.terminal_distance_test();
                let (upper_bound, _) =
                    self.upper_bound_solver.solve(&self.graph, &self.terminals);
                if upper_bound.is_finite() {
                    acted |= self.lower_bound_based_test(upper_bound);
                    acted |= self.reachability_test(upper_bound);
                    acted |= self.cut_reachability_test(upper_bound);
                }
                acted |= self.least_cost_test();
                acted |= self.long_edges_test();
                acted |= self.reduce_trivial();
            }
            log::debug!(
                "reduction pass: {} nodes, {} edges, {} terminals, {} inserted",
                self.graph.num_nodes(),
                self.graph.num_edges(),
                self.terminals.len(),
                self.cost_inserted
            );
            changed |= acted;
            if !acted {
                break;
            }
        }
        changed
    }

    /// Solve the reduced instance and express the result in original-instance
    /// terms. The returned cost includes the already-contracted weight.
    pub fn solve(&self, solver: &dyn SteinerSolver) -> (NaturalOrInfinite, OriginalSolution) {
        let (cost, tree) = solver.solve(&self.graph, &self.terminals);
        let solution = self.compute_original_solution(&tree);
        (
            cost + NaturalOrInfinite::from_finite(self.cost_inserted),
            solution,
        )
    }

    /// Expand a reduced-graph solution tree through the provenance forest.
    /// The terminals themselves are always part of the solution, whether or
    /// not the tree has edges (a fully collapsed instance yields an empty
    /// tree).
    pub fn compute_original_solution(&self, tree: &EdgeTree) -> OriginalSolution {
        let mut roots: Vec<ElementRef> = Vec::new();
        for e in tree.edges() {
            roots.push(self.edge_ref(e));
            let (a, b) = self.graph.endpoints(e);
            roots.push(self.node_ref(a));
            roots.push(self.node_ref(b));
        }
        for &t in &self.terminals {
            roots.push(self.node_ref(t));
        }
        let (mut nodes, edges) = self.provenance.expand(roots);
        // edge expansion yields edge positions only; pull in their endpoints
        for &i in &edges {
            let (a, b, _) = self.original_edges[i];
            nodes.push(a);
            nodes.push(b);
        }
        nodes.sort_unstable();
        nodes.dedup();
        let weight = edges
            .iter()
            .map(|&i| NaturalOrInfinite::from(self.original_edges[i].2))
            .sum();
        OriginalSolution {
            nodes,
            edges,
            weight,
        }
    }

    fn node_ref(&self, node: NodeId) -> ElementRef {
        ElementRef::Node(self.provenance.node_origin(node))
    }

    fn edge_ref(&self, edge: EdgeId) -> ElementRef {
        ElementRef::Edge(self.provenance.edge_origin(edge))
    }

    fn add_derived_node(&mut self, sons: Vec<ElementRef>) -> NodeId {
        let id = self.graph.add_node();
        self.is_terminal.push(false);
        self.provenance.register_node(id, sons);
        id
    }

    fn add_derived_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        weight: u64,
        sons: Vec<ElementRef>,
    ) -> EdgeId {
        let id = self.graph.add_edge(a, b, weight);
        self.provenance.register_edge(id, sons);
        id
    }

    /// Keeps the terminal list and membership array consistent.
    fn set_terminal(&mut self, node: NodeId, terminal: bool) {
        if self.is_terminal[node.index()] == terminal {
            return;
        }
        self.is_terminal[node.index()] = terminal;
        if terminal {
            self.terminals.push(node);
        } else {
            self.terminals.retain(|&t| t != node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{
        six_cycle, small_test_graph, steiner_example_paper, steiner_example_wiki, terminal_star,
    };
    use crate::steiner_tree::DreyfusWagner;
    use crate::util::TestResult;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};

    fn optimal_cost(graph: &Graph) -> NaturalOrInfinite {
        let working = WorkingGraph::from_graph(graph);
        let ids: Vec<NodeId> = working.node_ids().collect();
        let terminals: Vec<NodeId> = graph.terminals().iter().map(|&t| ids[t]).collect();
        DreyfusWagner.solve(&working, &terminals).0
    }

    /// The expanded solution must be connected in the original graph and
    /// contain every original terminal.
    fn assert_feasible_original(graph: &Graph, solution: &OriginalSolution) {
        for &t in graph.terminals() {
            assert!(solution.nodes.contains(&t), "terminal {t} not covered");
        }
        if solution.nodes.len() <= 1 {
            return;
        }
        let edge_list: Vec<_> = graph.edges().collect();
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in &solution.edges {
            let (a, b, _) = edge_list[i];
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }
        let start = solution.nodes[0];
        let mut reached = HashSet::from([start]);
        let mut queue = vec![start];
        while let Some(v) = queue.pop() {
            for &u in adjacency.get(&v).into_iter().flatten() {
                if reached.insert(u) {
                    queue.push(u);
                }
            }
        }
        for &v in &solution.nodes {
            assert!(reached.contains(&v), "solution is not connected");
        }
    }

    fn assert_reduction_preserves_optimum(graph: &Graph) {
        let expected = optimal_cost(graph);
        let mut reducer = Reducer::new(graph).unwrap();
        reducer.reduce_fast();
        let (total, solution) = reducer.solve(&DreyfusWagner);
        assert_eq!(total, expected, "reduction changed the optimal cost");
        assert_eq!(
            solution.weight,
            expected,
            "expanded solution weight differs from the optimum"
        );
        assert_feasible_original(graph, &solution);
    }

    #[test]
    fn test_construction() -> TestResult {
        let graph = six_cycle()?;
        let reducer = Reducer::new(&graph)?;
        assert_eq!(reducer.graph().num_nodes(), 6);
        assert_eq!(reducer.graph().num_edges(), 6);
        assert_eq!(reducer.terminals().len(), 2);
        assert_eq!(reducer.cost_inserted(), 0);
        Ok(())
    }

    #[test]
    fn test_no_terminals_is_an_error() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 2\n\
            Edges 1\n\
            E 1 2 1\n\
            END\n\
            SECTION Terminals\n\
            Terminals 0\n\
            END\n\
            EOF\n"
            .parse()?;
        assert!(matches!(
            Reducer::new(&graph),
            Err(InstanceError::NoTerminals)
        ));
        Ok(())
    }

    #[test]
    fn test_six_cycle_collapses_to_chain_cost() -> TestResult {
        // both halves of the cycle merge into parallel weight-3 edges, the
        // heavier duplicate goes, and the final edge is folded into the cost
        let graph = six_cycle()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.reduce_trivial());
        assert_eq!(reducer.graph().num_nodes(), 1);
        assert_eq!(reducer.graph().num_edges(), 0);
        assert_eq!(reducer.cost_inserted(), 3);
        let (total, solution) = reducer.solve(&DreyfusWagner);
        assert_eq!(total, 3.into());
        assert_eq!(solution.weight, 3.into());
        assert_eq!(solution.edges.len(), 3);
        assert_feasible_original(&graph, &solution);
        Ok(())
    }

    #[test]
    fn test_degree2_only_merges_chains() -> TestResult {
        let graph = six_cycle()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.degree2_test());
        assert_eq!(reducer.graph().num_nodes(), 2);
        assert_eq!(reducer.graph().num_edges(), 2);
        assert!(!reducer.graph().is_simple());
        assert!(reducer.make_simple());
        assert_eq!(reducer.graph().num_edges(), 1);
        let e = reducer.graph().edge_ids().next().unwrap();
        assert_eq!(reducer.graph().weight(e), 3);
        Ok(())
    }

    #[test]
    fn test_trivial_rules_are_idempotent() -> TestResult {
        let graph = steiner_example_wiki()?;
        let mut reducer = Reducer::new(&graph)?;
        reducer.reduce_trivial();
        assert!(!reducer.delete_leaves());
        assert!(!reducer.make_simple());
        assert!(!reducer.degree2_test());
        assert!(!reducer.delete_components_without_terminals());
        Ok(())
    }

    #[test]
    fn test_reduce_fast_keeps_terminal_preimages() -> TestResult {
        let graph = steiner_example_wiki()?;
        let mut reducer = Reducer::new(&graph)?;
        reducer.reduce_fast();
        // the graph either collapsed or stayed connected
        assert!(reducer.graph().num_nodes() <= 1 || reducer.graph().is_connected());
        // every original terminal still has a pre-image among the survivors
        let expansion = reducer.compute_original_solution(&EdgeTree::empty());
        for &t in graph.terminals() {
            assert!(expansion.nodes.contains(&t));
        }
        Ok(())
    }

    #[test]
    fn test_reduce_fast_preserves_optimum_wiki() -> TestResult {
        assert_reduction_preserves_optimum(&steiner_example_wiki()?);
        Ok(())
    }

    #[test]
    fn test_reduce_fast_preserves_optimum_paper() -> TestResult {
        assert_reduction_preserves_optimum(&steiner_example_paper()?);
        Ok(())
    }

    #[test]
    fn test_reduce_fast_preserves_optimum_star() -> TestResult {
        assert_reduction_preserves_optimum(&terminal_star()?);
        Ok(())
    }

    #[test]
    fn test_reduce_fast_preserves_optimum_small() -> TestResult {
        assert_reduction_preserves_optimum(&small_test_graph()?);
        Ok(())
    }

    #[test]
    fn test_reduce_fast_preserves_optimum_six_cycle() -> TestResult {
        assert_reduction_preserves_optimum(&six_cycle()?);
        Ok(())
    }

    #[test]
    fn test_single_terminal_short_circuits() -> TestResult {
        let graph: Graph = "SECTION Graph\n\
            Nodes 3\n\
            Edges 2\n\
            E 1 2 4\n\
            E 2 3 5\n\
            END\n\
            SECTION Terminals\n\
            Terminals 1\n\
            T 2\n\
            END\n\
            EOF\n"
            .parse()?;
        let mut reducer = Reducer::new(&graph)?;
        assert!(reducer.reduce_fast());
        assert_eq!(reducer.graph().num_nodes(), 1);
        assert_eq!(reducer.graph().num_edges(), 0);
        assert_eq!(reducer.cost_inserted(), 0);
        let (total, solution) = reducer.solve(&DreyfusWagner);
        assert_eq!(total, 0.into());
        assert_eq!(solution.nodes, vec![1]);
        assert!(solution.edges.is_empty());
        Ok(())
    }
}
