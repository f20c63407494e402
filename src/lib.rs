//! Reduction engine for the Steiner tree problem in graphs.
//!
//! Instances in PACE format are parsed into a [`Graph`], loaded into a
//! [`Reducer`] and shrunk by correctness-preserving rules. The reduced
//! instance can then be solved with any [`SteinerSolver`] and the solution is
//! expanded back to the original instance through the recorded provenance.

mod closest_terminals;
mod decomposition;
mod graph;
mod reduction;
mod shortest_paths;
mod steiner_tree;
mod util;
mod voronoi;
mod working_graph;

pub use decomposition::{HeavyPathDecomposition, SpanningTree};
pub use graph::{Graph, ParseError};
pub use reduction::{InstanceError, OriginalSolution, Reducer};
pub use steiner_tree::{DreyfusWagner, EdgeTree, SteinerSolver, TakahashiMatsuyama};
pub use util::NaturalOrInfinite;
pub use working_graph::{EdgeId, NodeId, WorkingGraph};
