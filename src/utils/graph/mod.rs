//! Graph infrastructure for program analysis.
//!
//! # Key Components
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - Traits the algorithms
//!   are written against
//! - [`algorithms`] - Traversals and dominator computation
//!
//! Graphs are built once and treated as immutable for analysis. Any change to a function's
//! body means building a new graph.

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
#[cfg(test)]
pub(crate) use traits::TestGraph;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
