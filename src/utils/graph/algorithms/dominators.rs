//! Dominator sets, dominator trees and dominance frontiers.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. Every node dominates itself. The **immediate dominator** of `n`
//! is the unique strict dominator of `n` that is dominated by every other strict dominator
//! of `n`; making it the parent of `n` forms the dominator tree.
//!
//! # Algorithm
//!
//! [`compute_dominators`] uses the classic iterative set formulation:
//!
//! ```text
//! dom[entry] = {entry}
//! dom[n]     = {n} ∪ ⋂ dom[p]   for every predecessor p of n
//! ```
//!
//! starting every other reachable node at the full set of reachable nodes and iterating in
//! reverse postorder until no set changes. Sets only shrink, so the iteration terminates.
//! The tree and the frontier are derived from the sets.
//!
//! # Unreachable Nodes
//!
//! Nodes not reachable from the entry are dominated only by themselves, have no parent in
//! the tree, and are ignored as predecessors when computing reachable nodes' sets.

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::graph::{algorithms::reverse_postorder, NodeId, Predecessors, RootedGraph};

/// The dominator set of every node of a rooted graph.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::ControlFlowGraph;
/// use tacopt::ir::FunctionBuilder;
/// use tacopt::utils::graph::algorithms::compute_dominators;
///
/// let function = FunctionBuilder::new("f")
///     .constant_bool("c", true)
///     .branch("c", "left", "right")
///     .label("left")
///     .jump("join")
///     .label("right")
///     .jump("join")
///     .label("join")
///     .ret(None)
///     .build();
/// let cfg = ControlFlowGraph::build(&function)?;
/// let doms = compute_dominators(&cfg);
///
/// let entry = cfg.entry();
/// let join = cfg.id("join").unwrap();
/// let left = cfg.id("left").unwrap();
/// assert!(doms.dominates(entry, join));
/// assert!(!doms.dominates(left, join));
/// assert_eq!(doms.immediate_dominator(join), Some(entry));
/// # Ok::<(), tacopt::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominatorSets {
    entry: NodeId,
    sets: Vec<BTreeSet<NodeId>>,
    reachable: Vec<bool>,
}

impl DominatorSets {
    /// Returns the entry node the sets were computed from.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the number of nodes covered.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if the node is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.reachable.get(node.index()).copied().unwrap_or(false)
    }

    /// Returns the set of nodes dominating `node`, including `node` itself.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn dominators(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.sets[node.index()]
    }

    /// Checks if node `a` dominates node `b`. A node dominates itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.sets
            .get(b.index())
            .is_some_and(|set| set.contains(&a))
    }

    /// Checks if node `a` strictly dominates node `b` (dominates and is different).
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the immediate dominator of a node, or `None` for the entry and for
    /// unreachable nodes.
    ///
    /// `a` is the immediate dominator of `b` iff `dom[b] = dom[a] ∪ {b}`. Since the dominators
    /// of a node form a chain, this is the strict dominator with the largest set.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        let set = self.sets.get(node.index())?;
        set.iter()
            .copied()
            .filter(|&candidate| candidate != node)
            .find(|&candidate| self.sets[candidate.index()].len() + 1 == set.len())
    }

    /// Builds the dominator tree from the sets.
    #[must_use]
    pub fn tree(&self) -> DominatorTree {
        let count = self.sets.len();
        let mut idom = vec![None; count];
        let mut children = vec![BTreeSet::new(); count];

        for index in 0..count {
            let node = NodeId::new(index);
            if let Some(parent) = self.immediate_dominator(node) {
                idom[index] = Some(parent);
                children[parent.index()].insert(node);
            }
        }

        DominatorTree {
            entry: self.entry,
            idom,
            children,
        }
    }

    /// Computes the dominance frontier of every node.
    ///
    /// `n ∈ DF[d]` iff `d` does not strictly dominate `n` and `d` dominates some predecessor
    /// of `n`. A node appears in its own frontier only when it heads a cycle.
    #[must_use]
    pub fn frontier<G: Predecessors>(&self, graph: &G) -> DominanceFrontier {
        let count = self.sets.len();
        let mut frontiers = vec![BTreeSet::new(); count];

        for index in 0..count {
            let node = NodeId::new(index);
            for pred in graph.predecessors(node) {
                for &dominator in &self.sets[pred.index()] {
                    if !self.strictly_dominates(dominator, node) {
                        frontiers[dominator.index()].insert(node);
                    }
                }
            }
        }

        DominanceFrontier { frontiers }
    }

    /// Converts the sets into a name-keyed map using `name` to label nodes.
    pub fn named<F>(&self, name: F) -> BTreeMap<String, BTreeSet<String>>
    where
        F: Fn(NodeId) -> String,
    {
        named_sets(&self.sets, name)
    }
}

/// The dominator tree: the immediate dominator and tree children of every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominatorTree {
    entry: NodeId,
    idom: Vec<Option<NodeId>>,
    children: Vec<BTreeSet<NodeId>>,
}

impl DominatorTree {
    /// Returns the root of the tree.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of a node, or `None` for the root and for
    /// unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns the nodes immediately dominated by `node`, by ascending id.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.children[node.index()]
    }

    /// Returns the depth of a node in the tree. The root has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.immediate_dominator(current) {
            current = parent;
            depth += 1;
        }
        depth
    }

    /// Converts the tree into a name-keyed child map using `name` to label nodes.
    pub fn named<F>(&self, name: F) -> BTreeMap<String, BTreeSet<String>>
    where
        F: Fn(NodeId) -> String,
    {
        named_sets(&self.children, name)
    }
}

/// The dominance frontier of every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominanceFrontier {
    frontiers: Vec<BTreeSet<NodeId>>,
}

impl DominanceFrontier {
    /// Returns the frontier of `node`.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn frontier(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.frontiers[node.index()]
    }

    /// Converts the frontiers into a name-keyed map using `name` to label nodes.
    pub fn named<F>(&self, name: F) -> BTreeMap<String, BTreeSet<String>>
    where
        F: Fn(NodeId) -> String,
    {
        named_sets(&self.frontiers, name)
    }
}

fn named_sets<F>(sets: &[BTreeSet<NodeId>], name: F) -> BTreeMap<String, BTreeSet<String>>
where
    F: Fn(NodeId) -> String,
{
    sets.iter()
        .enumerate()
        .map(|(index, set)| {
            (
                name(NodeId::new(index)),
                set.iter().map(|&node| name(node)).collect(),
            )
        })
        .collect()
}

/// Computes the dominator set of every node of a rooted graph.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
///
/// # Returns
///
/// The [`DominatorSets`] of every node. An empty graph yields empty sets.
///
/// # Complexity
///
/// O(V² · E) in the worst case. Iterating in reverse postorder converges in a few passes
/// for reducible graphs.
pub fn compute_dominators<G: RootedGraph>(graph: &G) -> DominatorSets {
    let count = graph.node_count();
    let entry = graph.entry();
    if count == 0 || entry.index() >= count {
        return DominatorSets {
            entry,
            sets: Vec::new(),
            reachable: Vec::new(),
        };
    }

    let order = reverse_postorder(graph, entry);
    let mut reachable = vec![false; count];
    for &node in &order {
        reachable[node.index()] = true;
    }

    let universe: BTreeSet<NodeId> = order.iter().copied().collect();
    let mut sets: Vec<BTreeSet<NodeId>> = (0..count)
        .map(|index| {
            let node = NodeId::new(index);
            if node == entry || !reachable[index] {
                BTreeSet::from([node])
            } else {
                universe.clone()
            }
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &node in order.iter().filter(|&&node| node != entry) {
            let mut intersection: Option<BTreeSet<NodeId>> = None;
            for pred in graph.predecessors(node) {
                if !reachable[pred.index()] {
                    continue;
                }
                let pred_set = &sets[pred.index()];
                intersection = Some(match intersection {
                    None => pred_set.clone(),
                    Some(current) => current.intersection(pred_set).copied().collect(),
                });
            }

            let mut updated = intersection.unwrap_or_default();
            updated.insert(node);
            if updated != sets[node.index()] {
                sets[node.index()] = updated;
                changed = true;
            }
        }
    }

    DominatorSets {
        entry,
        sets,
        reachable,
    }
}
