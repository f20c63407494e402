mod algorithms;
mod tree;

pub use algorithms::{DreyfusWagner, SteinerSolver, TakahashiMatsuyama};
pub use tree::EdgeTree;
