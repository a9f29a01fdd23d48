//! Trait definitions for graph abstractions.
//!
//! Graph algorithms in this crate are written against these traits rather than against
//! [`ControlFlowGraph`](crate::analysis::ControlFlowGraph) directly, so the traversal and
//! dominance code can be exercised on small hand-built graphs.
//!
//! - [`GraphBase`] - Core properties: node count and node iteration
//! - [`Successors`] - Forward edge traversal (outgoing edges)
//! - [`Predecessors`] - Backward edge traversal (incoming edges)
//! - [`RootedGraph`] - Graphs with a designated entry node (for dominator computation)
//!
//! All adjacency queries return iterators rather than collections.

use crate::utils::graph::NodeId;

/// Base trait providing core graph properties.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node identifiers in the graph, by ascending index.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns an iterator over the successor nodes of the given node.
    ///
    /// For a directed edge `(u, v)`, node `v` is a successor of `u`. The order is the order
    /// in which the graph stores the edges; for control flow graphs this is the order of the
    /// terminator's label operands.
    ///
    /// # Panics
    ///
    /// May panic if `node` is not a valid node in the graph.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns an iterator over the predecessor nodes of the given node.
    ///
    /// For a directed edge `(u, v)`, node `u` is a predecessor of `v`.
    ///
    /// # Panics
    ///
    /// May panic if `node` is not a valid node in the graph.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs with a designated entry (root) node.
///
/// This is the starting point for forward traversals and the root of dominator computation.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry (root) node of the graph.
    fn entry(&self) -> NodeId;
}

/// A minimal edge-list graph used by the algorithm tests.
#[cfg(test)]
pub(crate) struct TestGraph {
    node_count: usize,
    edges: Vec<(NodeId, NodeId)>,
    entry: NodeId,
}

#[cfg(test)]
impl TestGraph {
    /// Builds a graph from `(source, target)` index pairs, rooted at node 0.
    pub(crate) fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
        TestGraph {
            node_count,
            edges: edges
                .iter()
                .map(|&(src, dst)| (NodeId::new(src), NodeId::new(dst)))
                .collect(),
            entry: NodeId::new(0),
        }
    }
}

#[cfg(test)]
impl GraphBase for TestGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count).map(NodeId::new)
    }
}

#[cfg(test)]
impl Successors for TestGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(src, _)| *src == node)
            .map(|(_, dst)| *dst)
    }
}

#[cfg(test)]
impl Predecessors for TestGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(_, dst)| *dst == node)
            .map(|(src, _)| *src)
    }
}

#[cfg(test)]
impl RootedGraph for TestGraph {
    fn entry(&self) -> NodeId {
        self.entry
    }
}
