//! Natural loop detection.
//!
//! ```text
//!     [preheader]     <- Single entry predecessor (optional, may need insertion)
//!          |
//!          v
//!     [header] <------+  <- Single entry point, dominates all loop nodes
//!          |          |
//!          v          |
//!     [body ...]      |  <- Loop body nodes
//!          |          |
//!          v          |
//!     [latch] --------+  <- Back edge source(s)
//!          |
//!          v
//!     [exit ...]         <- Exit blocks (outside loop, have predecessor in loop)
//! ```
//!
//! An edge `n -> h` is a **back edge** when `h` dominates `n`. The natural loop of a back edge
//! is grown backwards from `n` through predecessors until the header is reached. Every
//! predecessor met on the way must itself be dominated by the header; if one is not, the edge
//! does not delimit a natural loop and is ignored. Loops sharing a header are merged.
//!
//! Blocks unreachable from the entry never execute and are ignored as predecessors.

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::graph::{algorithms::DominatorSets, NodeId, RootedGraph};

/// An edge leaving a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    /// The block inside the loop that branches out.
    pub exiting_block: NodeId,
    /// The block outside the loop that is the exit target.
    pub exit_block: NodeId,
}

/// A natural loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    /// The header block (single entry point, dominates all loop nodes).
    pub header: NodeId,
    /// All blocks in the loop body, including the header.
    pub body: BTreeSet<NodeId>,
    /// Back edge sources (blocks that jump to the header from within the loop).
    pub latches: Vec<NodeId>,
    /// The single predecessor of the header outside the loop, if there is exactly one.
    pub preheader: Option<NodeId>,
    /// Edges leaving the loop.
    pub exits: Vec<LoopExit>,
    /// Nesting depth (0 = outermost).
    pub depth: usize,
    /// Header of the immediately enclosing loop.
    pub parent: Option<NodeId>,
    /// Headers of the immediately nested loops.
    pub children: Vec<NodeId>,
}

impl LoopInfo {
    /// Creates a loop consisting only of its header.
    #[must_use]
    pub fn new(header: NodeId) -> Self {
        Self {
            header,
            body: BTreeSet::from([header]),
            latches: Vec::new(),
            preheader: None,
            exits: Vec::new(),
            depth: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.body.contains(&node)
    }

    /// Returns the number of blocks in the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Returns true if this is an innermost loop (no children).
    #[must_use]
    pub fn is_innermost(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the blocks inside the loop that have a successor outside it.
    #[must_use]
    pub fn exiting_blocks(&self) -> BTreeSet<NodeId> {
        self.exits.iter().map(|exit| exit.exiting_block).collect()
    }

    /// Returns the blocks outside the loop that are targets of exit edges.
    #[must_use]
    pub fn exit_blocks(&self) -> BTreeSet<NodeId> {
        self.exits.iter().map(|exit| exit.exit_block).collect()
    }
}

/// All loops of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopForest {
    loops: Vec<LoopInfo>,
}

impl LoopForest {
    /// Returns all loops, ordered by header.
    #[must_use]
    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the loop with the given header.
    #[must_use]
    pub fn loop_for_header(&self, header: NodeId) -> Option<&LoopInfo> {
        self.loops.iter().find(|info| info.header == header)
    }

    /// Returns the innermost loop containing the given block.
    #[must_use]
    pub fn innermost_loop(&self, block: NodeId) -> Option<&LoopInfo> {
        self.loops
            .iter()
            .filter(|info| info.contains(block))
            .max_by_key(|info| info.depth)
    }

    /// Returns the number of loops containing the block.
    #[must_use]
    pub fn loop_depth(&self, block: NodeId) -> usize {
        self.innermost_loop(block).map_or(0, |info| info.depth + 1)
    }

    /// Iterates over all loops.
    pub fn iter(&self) -> impl Iterator<Item = &LoopInfo> {
        self.loops.iter()
    }

    /// Returns loops sorted innermost first.
    #[must_use]
    pub fn by_depth_descending(&self) -> Vec<&LoopInfo> {
        let mut sorted: Vec<_> = self.loops.iter().collect();
        sorted.sort_by_key(|info| std::cmp::Reverse(info.depth));
        sorted
    }
}

/// Detects all natural loops of a graph.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
/// * `dominators` - Dominator sets of the graph
///
/// # Returns
///
/// A [`LoopForest`] with one loop per header, ordered by header id.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::{cfg::detect_loops, ControlFlowGraph};
/// use tacopt::ir::FunctionBuilder;
/// use tacopt::utils::graph::algorithms::compute_dominators;
///
/// let function = FunctionBuilder::new("count")
///     .constant("i", 0)
///     .constant("one", 1)
///     .label("loop")
///     .op("add", "i", &["i", "one"])
///     .op("lt", "again", &["i", "one"])
///     .branch("again", "loop", "done")
///     .label("done")
///     .ret(None)
///     .build();
///
/// let cfg = ControlFlowGraph::build(&function)?;
/// let forest = detect_loops(&cfg, &compute_dominators(&cfg));
/// assert_eq!(forest.len(), 1);
/// assert_eq!(forest.loops()[0].header, cfg.id("loop").unwrap());
/// # Ok::<(), tacopt::Error>(())
/// ```
#[must_use]
pub fn detect_loops<G: RootedGraph>(graph: &G, dominators: &DominatorSets) -> LoopForest {
    let mut loops_by_header: BTreeMap<NodeId, LoopInfo> = BTreeMap::new();

    for node in graph.node_ids() {
        if !dominators.is_reachable(node) {
            continue;
        }
        for succ in graph.successors(node) {
            if !dominators.dominates(succ, node) {
                continue;
            }
            let Some(body) = find_loop_body(graph, dominators, succ, node) else {
                continue;
            };
            let info = loops_by_header
                .entry(succ)
                .or_insert_with(|| LoopInfo::new(succ));
            if !info.latches.contains(&node) {
                info.latches.push(node);
            }
            info.body.extend(body);
        }
    }

    let mut loops: Vec<LoopInfo> = loops_by_header.into_values().collect();
    for info in &mut loops {
        compute_preheader(graph, dominators, info);
        compute_exits(graph, info);
    }
    compute_nesting(&mut loops);

    LoopForest { loops }
}

/// Computes the body of the natural loop of the back edge `latch -> header`.
///
/// Returns `None` when some block on a path into the latch is not dominated by the header,
/// i.e. the region has a second entry and is not a natural loop.
#[must_use]
pub fn find_loop_body<G: RootedGraph>(
    graph: &G,
    dominators: &DominatorSets,
    header: NodeId,
    latch: NodeId,
) -> Option<BTreeSet<NodeId>> {
    let mut body = BTreeSet::from([header, latch]);
    let mut worklist = if latch == header { Vec::new() } else { vec![latch] };

    while let Some(node) = worklist.pop() {
        for pred in graph.predecessors(node) {
            if !dominators.is_reachable(pred) {
                continue;
            }
            if !dominators.dominates(header, pred) {
                return None;
            }
            if body.insert(pred) && pred != header {
                worklist.push(pred);
            }
        }
    }

    // Every block other than the header is entered only from inside the loop
    let closed = body.iter().filter(|&&node| node != header).all(|&node| {
        graph
            .predecessors(node)
            .filter(|pred| dominators.is_reachable(*pred))
            .all(|pred| body.contains(&pred))
    });

    closed.then_some(body)
}

fn compute_preheader<G: RootedGraph>(graph: &G, dominators: &DominatorSets, info: &mut LoopInfo) {
    let outside: Vec<NodeId> = graph
        .predecessors(info.header)
        .filter(|pred| dominators.is_reachable(*pred) && !info.body.contains(pred))
        .collect();

    info.preheader = if outside.len() == 1 {
        Some(outside[0])
    } else {
        None
    };
}

fn compute_exits<G: RootedGraph>(graph: &G, info: &mut LoopInfo) {
    info.exits.clear();
    for &block in &info.body {
        for succ in graph.successors(block) {
            let exit = LoopExit {
                exiting_block: block,
                exit_block: succ,
            };
            if !info.body.contains(&succ) && !info.exits.contains(&exit) {
                info.exits.push(exit);
            }
        }
    }
}

fn compute_nesting(loops: &mut [LoopInfo]) {
    let count = loops.len();

    // The parent is the smallest other loop containing this header
    for i in 0..count {
        let header = loops[i].header;
        let parent = (0..count)
            .filter(|&j| j != i && loops[j].body.contains(&header))
            .min_by_key(|&j| loops[j].size())
            .map(|j| loops[j].header);
        loops[i].parent = parent;
    }

    let by_header: BTreeMap<NodeId, usize> = loops
        .iter()
        .enumerate()
        .map(|(index, info)| (info.header, index))
        .collect();

    for i in 0..count {
        if let Some(parent) = loops[i].parent {
            if let Some(&parent_index) = by_header.get(&parent) {
                let child = loops[i].header;
                loops[parent_index].children.push(child);
            }
        }
    }

    for i in 0..count {
        let mut depth = 0;
        let mut current = loops[i].parent;
        while let Some(parent) = current {
            depth += 1;
            current = by_header
                .get(&parent)
                .and_then(|&index| loops[index].parent);
            if depth > count {
                break;
            }
        }
        loops[i].depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::{algorithms::compute_dominators, TestGraph};

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    #[test]
    fn test_self_loop() {
        // 0 -> 1, 1 -> 1, 1 -> 2
        let graph = TestGraph::new(3, &[(0, 1), (1, 1), (1, 2)]);
        let forest = detect_loops(&graph, &compute_dominators(&graph));
        assert_eq!(forest.len(), 1);
        let info = &forest.loops()[0];
        assert_eq!(info.header, n(1));
        assert_eq!(info.body, BTreeSet::from([n(1)]));
        assert_eq!(info.latches, vec![n(1)]);
        assert_eq!(info.preheader, Some(n(0)));
        assert_eq!(info.exit_blocks(), BTreeSet::from([n(2)]));
        assert_eq!(info.exiting_blocks(), BTreeSet::from([n(1)]));
    }

    #[test]
    fn test_nested_loops() {
        // 0 -> 1 -> 2 -> 3 -> 2, 3 -> 4 -> 1, 1 -> 5
        let graph = TestGraph::new(
            6,
            &[(0, 1), (1, 2), (2, 3), (3, 2), (3, 4), (4, 1), (1, 5)],
        );
        let forest = detect_loops(&graph, &compute_dominators(&graph));
        assert_eq!(forest.len(), 2);

        let outer = forest.loop_for_header(n(1)).unwrap();
        let inner = forest.loop_for_header(n(2)).unwrap();
        assert_eq!(outer.body, BTreeSet::from([n(1), n(2), n(3), n(4)]));
        assert_eq!(inner.body, BTreeSet::from([n(2), n(3)]));
        assert_eq!(inner.parent, Some(n(1)));
        assert_eq!(inner.depth, 1);
        assert_eq!(outer.children, vec![n(2)]);
        assert!(inner.is_innermost());
        assert_eq!(forest.by_depth_descending()[0].header, n(2));
        assert_eq!(forest.loop_depth(n(3)), 2);
        assert_eq!(forest.loop_depth(n(5)), 0);
    }

    #[test]
    fn test_multiple_latches_merge() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3 -> 1, 1 -> 4
        let graph = TestGraph::new(5, &[(0, 1), (1, 2), (2, 1), (1, 3), (3, 1), (1, 4)]);
        let forest = detect_loops(&graph, &compute_dominators(&graph));
        assert_eq!(forest.len(), 1);
        let info = &forest.loops()[0];
        assert_eq!(info.latches, vec![n(2), n(3)]);
        assert_eq!(info.body, BTreeSet::from([n(1), n(2), n(3)]));
    }

    #[test]
    fn test_irreducible_cycle_is_not_a_loop() {
        // 0 -> 1, 0 -> 2, 1 -> 2, 2 -> 1: neither 1 nor 2 dominates the other
        let graph = TestGraph::new(3, &[(0, 1), (0, 2), (1, 2), (2, 1)]);
        let forest = detect_loops(&graph, &compute_dominators(&graph));
        assert!(forest.is_empty());
    }

    #[test]
    fn test_unreachable_predecessor_ignored() {
        // 3 is unreachable and jumps into the loop body
        let graph = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (3, 2)]);
        let forest = detect_loops(&graph, &compute_dominators(&graph));
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.loops()[0].body, BTreeSet::from([n(1), n(2)]));
    }
}
