//! Graph algorithms for program analysis.
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first search traversal
//! - [`postorder`] - Postorder traversal
//! - [`reverse_postorder`] - Reverse postorder traversal (useful for data flow)
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Iterative dominator sets
//! - [`DominatorSets`] - Result of dominator computation
//! - [`DominatorTree`] - Immediate dominators and tree children
//! - [`DominanceFrontier`] - Dominance frontiers for phi placement
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS / postorder | O(V + E) | General traversal, iteration orders |
//! | Dominators | O(V² · E) worst case | SSA construction, loop analysis |

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, DominanceFrontier, DominatorSets, DominatorTree};
pub use traversal::{dfs, postorder, reverse_postorder, DfsIterator};
