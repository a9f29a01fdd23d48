//! Control Flow Graph implementation.
//!
//! This module provides the main [`ControlFlowGraph`] structure: an arena of basic blocks
//! addressed by [`NodeId`], with ordered successor lists and de-duplicated predecessor lists
//! derived from each block's terminator.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{
    analysis::cfg::{split_blocks, BasicBlock},
    ir::{Function, Instruction, OP_BR, OP_JMP},
    utils::{
        dot::{DotGraph, NodeStyle},
        graph::{
            algorithms::{dfs, reverse_postorder},
            GraphBase, NodeId, Predecessors, RootedGraph, Successors,
        },
    },
    Result,
};

/// Options controlling how a [`ControlFlowGraph`] names its blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfgOptions {
    /// Prefix every block name with `<function>.` so the blocks of several functions can share
    /// one namespace.
    pub qualify_names: bool,
}

/// A control flow graph over the basic blocks of one function.
///
/// Blocks are stored in layout order; [`NodeId`] `n` is the `n`-th block. Names are unique:
/// labelled blocks are named after their label, an unlabelled first block is named `entry` and
/// any other unlabelled block receives a synthetic `b<N>` name that never collides with a real
/// label.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::ControlFlowGraph;
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("main")
///     .constant("x", 1)
///     .label("next")
///     .ret(Some("x"))
///     .build();
///
/// let cfg = ControlFlowGraph::build(&function)?;
/// assert_eq!(cfg.block_count(), 2);
/// assert_eq!(cfg.name(cfg.entry()), "entry");
///
/// let next = cfg.id("next").unwrap();
/// assert_eq!(cfg.successors(cfg.entry()), &[next]);
/// assert!(cfg.exits().contains(&next));
/// # Ok::<(), tacopt::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    function: String,
    blocks: Vec<BasicBlock>,
    names: HashMap<String, NodeId>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    exits: Vec<NodeId>,
}

impl ControlFlowGraph {
    /// Builds the control flow graph of a function with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if a label is defined twice or a
    /// jump names a label that no block carries.
    pub fn build(function: &Function) -> Result<Self> {
        Self::build_with(function, &CfgOptions::default())
    }

    /// Builds the control flow graph of a function.
    ///
    /// # Arguments
    ///
    /// * `function` - The function whose body is split into blocks
    /// * `options` - Naming options
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if a label is defined twice or a
    /// jump names a label that no block carries.
    pub fn build_with(function: &Function, options: &CfgOptions) -> Result<Self> {
        let sequences = split_blocks(&function.instrs);

        let mut labels: HashMap<String, NodeId> = HashMap::new();
        for (index, sequence) in sequences.iter().enumerate() {
            if let Some(label) = sequence.first().and_then(Instruction::as_label) {
                if labels.insert(label.to_string(), NodeId::new(index)).is_some() {
                    return Err(malformed_error!(
                        "label '{}' is defined more than once in function '{}'",
                        label,
                        function.name
                    ));
                }
            }
        }

        let qualify = |name: &str| {
            if options.qualify_names {
                format!("{}.{name}", function.name)
            } else {
                name.to_string()
            }
        };

        // Real labels are reserved before any synthetic name is handed out
        let mut taken: HashSet<String> = labels.keys().map(|label| qualify(label)).collect();
        let mut blocks = Vec::with_capacity(sequences.len());
        for (index, instrs) in sequences.into_iter().enumerate() {
            let label = instrs
                .first()
                .and_then(Instruction::as_label)
                .map(str::to_string);
            let name = match &label {
                Some(label) => qualify(label),
                None => {
                    let base = if index == 0 {
                        qualify("entry")
                    } else {
                        qualify(&format!("b{index}"))
                    };
                    let name = unique_name(&base, &taken);
                    taken.insert(name.clone());
                    name
                }
            };
            blocks.push(BasicBlock {
                name,
                label,
                instrs,
            });
        }

        let mut successors = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            let succs = match block.terminator() {
                Some(term) if term.op == OP_JMP || term.op == OP_BR => term
                    .labels
                    .iter()
                    .map(|target| {
                        labels.get(target).copied().ok_or_else(|| {
                            malformed_error!(
                                "block '{}' jumps to unknown label '{}'",
                                block.name,
                                target
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => Vec::new(),
                None if index + 1 < blocks.len() => vec![NodeId::new(index + 1)],
                None => Vec::new(),
            };
            successors.push(succs);
        }

        let mut predecessors: Vec<Vec<NodeId>> = vec![Vec::new(); blocks.len()];
        for (index, succs) in successors.iter().enumerate() {
            for succ in succs {
                let preds = &mut predecessors[succ.index()];
                if !preds.contains(&NodeId::new(index)) {
                    preds.push(NodeId::new(index));
                }
            }
        }

        let exits = successors
            .iter()
            .enumerate()
            .filter(|(_, succs)| succs.is_empty())
            .map(|(index, _)| NodeId::new(index))
            .collect();

        let names = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (block.name.clone(), NodeId::new(index)))
            .collect();

        Ok(ControlFlowGraph {
            function: function.name.clone(),
            blocks,
            names,
            successors,
            predecessors,
            exits,
        })
    }

    /// Returns the name of the function this graph was built from.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// Returns the entry block. For an empty function this id addresses no block.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Returns the blocks without successors.
    #[must_use]
    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the function has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns all blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, node: NodeId) -> Option<&BasicBlock> {
        self.blocks.get(node.index())
    }

    /// Returns the block with the given name.
    #[must_use]
    pub fn block_by_name(&self, name: &str) -> Option<&BasicBlock> {
        self.id(name).and_then(|node| self.block(node))
    }

    /// Returns the id of the block with the given name.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Returns the name of a block.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn name(&self, node: NodeId) -> &str {
        &self.blocks[node.index()].name
    }

    /// Returns the successors of a block in terminator order.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.successors[node.index()]
    }

    /// Returns the distinct predecessors of a block.
    ///
    /// # Panics
    ///
    /// Panics if the node index is out of bounds.
    #[must_use]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.predecessors[node.index()]
    }

    /// Returns the blocks reachable from the entry in reverse postorder.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<NodeId> {
        reverse_postorder(self, self.entry())
    }

    /// Returns the set of blocks reachable from the entry.
    #[must_use]
    pub fn reachable(&self) -> BTreeSet<NodeId> {
        dfs(self, self.entry()).collect()
    }

    /// Returns the successor relation keyed by block name.
    #[must_use]
    pub fn successor_map(&self) -> BTreeMap<String, Vec<String>> {
        self.named_adjacency(&self.successors)
    }

    /// Returns the predecessor relation keyed by block name.
    #[must_use]
    pub fn predecessor_map(&self) -> BTreeMap<String, Vec<String>> {
        self.named_adjacency(&self.predecessors)
    }

    fn named_adjacency(&self, adjacency: &[Vec<NodeId>]) -> BTreeMap<String, Vec<String>> {
        self.blocks
            .iter()
            .zip(adjacency)
            .map(|(block, nodes)| {
                (
                    block.name.clone(),
                    nodes
                        .iter()
                        .map(|&node| self.name(node).to_string())
                        .collect(),
                )
            })
            .collect()
    }

    /// Returns a copy of every instruction, in block order.
    #[must_use]
    pub fn instructions(&self) -> Vec<Instruction> {
        self.blocks
            .iter()
            .flat_map(|block| block.instrs.iter().cloned())
            .collect()
    }

    /// Flattens the blocks back into a function body.
    #[must_use]
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.blocks
            .into_iter()
            .flat_map(|block| block.instrs)
            .collect()
    }

    /// Renders the graph in Graphviz DOT format.
    ///
    /// Entry and exit blocks are highlighted; the two edges of a `br` are labelled `T` and `F`.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional graph title; defaults to the function name
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = DotGraph::new(&self.function, Some(title.unwrap_or(&self.function)));

        for (index, block) in self.blocks.iter().enumerate() {
            let node = NodeId::new(index);
            let style = if node == self.entry() {
                NodeStyle::Entry
            } else if self.exits.contains(&node) {
                NodeStyle::Exit
            } else {
                NodeStyle::Plain
            };
            let header = format!("{}:", block.name);
            let lines = std::iter::once(header).chain(
                block
                    .operations()
                    .map(std::string::ToString::to_string),
            );
            dot.node(&block.name, lines, style);
        }

        for (index, block) in self.blocks.iter().enumerate() {
            let succs = &self.successors[index];
            let is_branch = block.terminator().is_some_and(|op| op.op == OP_BR);
            for (position, &succ) in succs.iter().enumerate() {
                let label = match (is_branch, position) {
                    (true, 0) => Some("T"),
                    (true, _) => Some("F"),
                    _ => None,
                };
                dot.edge(&block.name, self.name(succ), label);
            }
        }

        dot.finish()
    }
}

/// Returns `base` if it is free, otherwise `base.1`, `base.2`, ... until one is.
pub(crate) fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1usize..)
        .map(|suffix| format!("{base}.{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

impl GraphBase for ControlFlowGraph {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for ControlFlowGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.successors[node.index()].iter().copied()
    }
}

impl Predecessors for ControlFlowGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessors[node.index()].iter().copied()
    }
}

impl RootedGraph for ControlFlowGraph {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}
