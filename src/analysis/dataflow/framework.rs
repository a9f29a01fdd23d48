//! Data flow analysis framework trait and direction.
//!
//! Any specific analysis (reaching definitions, liveness) implements the [`DataFlowAnalysis`]
//! trait to work with the [`DataFlowSolver`](crate::analysis::dataflow::DataFlowSolver).

use std::{collections::BTreeMap, fmt::Debug, hash::Hash};

use crate::{
    analysis::ControlFlowGraph,
    ir::Instruction,
    utils::graph::NodeId,
};

/// Direction of data flow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Information flows forward, from entry to exit.
    ///
    /// The input of a block is merged from the outputs of its predecessors.
    ///
    /// Examples: reaching definitions, available expressions.
    Forward,

    /// Information flows backward, from exit to entry.
    ///
    /// The output of a block is merged from the inputs of its successors.
    ///
    /// Examples: live variables, very busy expressions.
    Backward,
}

/// A data flow analysis over the blocks of a [`ControlFlowGraph`].
///
/// Implementations provide the initial states, the merge operator and the block transfer
/// function; the solver handles iteration to a fixpoint. States must change monotonically
/// under `merge` and `transfer` for the iteration to terminate.
///
/// For forward analyses: `in[B] = merge(in[B], out[preds])`, `out[B] = transfer(in[B])`.
/// For backward analyses: `out[B] = merge(out[B], in[succs])`, `in[B] = transfer(out[B])`.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeSet;
/// use tacopt::analysis::{dataflow::{DataFlowAnalysis, Direction, run_dataflow}, ControlFlowGraph};
/// use tacopt::ir::{FunctionBuilder, Instruction};
/// use tacopt::utils::graph::NodeId;
///
/// /// Collects every opcode executed on some path into a block.
/// struct SeenOps;
///
/// impl DataFlowAnalysis for SeenOps {
///     type State = BTreeSet<String>;
///     const DIRECTION: Direction = Direction::Forward;
///
///     fn initialize(&self, _cfg: &ControlFlowGraph, _block: NodeId) -> (Self::State, Self::State) {
///         (BTreeSet::new(), BTreeSet::new())
///     }
///
///     fn merge(&self, existing: &Self::State, neighbors: &[&Self::State]) -> Self::State {
///         let mut merged = existing.clone();
///         for state in neighbors {
///             merged.extend(state.iter().cloned());
///         }
///         merged
///     }
///
///     fn transfer(&self, input: &Self::State, _block: &str, instrs: &[Instruction]) -> Self::State {
///         let mut out = input.clone();
///         out.extend(instrs.iter().filter_map(|i| i.as_operation()).map(|op| op.op.clone()));
///         out
///     }
/// }
///
/// let function = FunctionBuilder::new("f").constant("x", 1).label("next").ret(None).build();
/// let results = run_dataflow(&function, SeenOps)?;
/// assert!(results.in_states[1].contains("const"));
/// # Ok::<(), tacopt::Error>(())
/// ```
pub trait DataFlowAnalysis {
    /// The abstract state attached to block boundaries.
    type State: Clone + Eq + Hash + Debug;

    /// The direction of this analysis.
    const DIRECTION: Direction;

    /// Returns the initial `(in, out)` states of a block.
    ///
    /// Boundary conditions (e.g. "all arguments are defined at entry") are expressed here by
    /// returning a non-trivial state for the boundary block.
    fn initialize(&self, cfg: &ControlFlowGraph, block: NodeId) -> (Self::State, Self::State);

    /// Combines the states flowing into a block.
    ///
    /// # Arguments
    ///
    /// * `existing` - The block's current state on the merge side
    /// * `neighbors` - Predecessor outputs (forward) or successor inputs (backward)
    fn merge(&self, existing: &Self::State, neighbors: &[&Self::State]) -> Self::State;

    /// Computes the state on the far side of a block.
    ///
    /// # Arguments
    ///
    /// * `input` - The state on the merge side
    /// * `block` - The block name
    /// * `instrs` - The block's instructions, in layout order
    fn transfer(&self, input: &Self::State, block: &str, instrs: &[Instruction]) -> Self::State;
}

/// Results of a data flow analysis.
///
/// Both directions report states in CFG terms: `in_states[b]` holds at the top of block `b` and
/// `out_states[b]` at the bottom, indexed by [`NodeId::index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResults<S> {
    /// State at the top of each block.
    pub in_states: Vec<S>,
    /// State at the bottom of each block.
    pub out_states: Vec<S>,
    /// Number of blocks processed until the fixpoint was reached.
    pub iterations: usize,
}

impl<S> AnalysisResults<S> {
    /// Creates new analysis results with the given states.
    #[must_use]
    pub fn new(in_states: Vec<S>, out_states: Vec<S>) -> Self {
        Self {
            in_states,
            out_states,
            iterations: 0,
        }
    }

    /// Returns the input state for a block, or `None` if the id is out of bounds.
    #[must_use]
    pub fn in_state(&self, block: NodeId) -> Option<&S> {
        self.in_states.get(block.index())
    }

    /// Returns the output state for a block, or `None` if the id is out of bounds.
    #[must_use]
    pub fn out_state(&self, block: NodeId) -> Option<&S> {
        self.out_states.get(block.index())
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.in_states.len()
    }

    /// Returns `(in, out)` maps keyed by block name.
    #[must_use]
    pub fn named(&self, cfg: &ControlFlowGraph) -> (BTreeMap<String, S>, BTreeMap<String, S>)
    where
        S: Clone,
    {
        let label = |states: &[S]| {
            states
                .iter()
                .enumerate()
                .map(|(index, state)| (cfg.name(NodeId::new(index)).to_string(), state.clone()))
                .collect()
        };
        (label(&self.in_states), label(&self.out_states))
    }

    /// Returns `true` if both results hold the same states, ignoring iteration counts.
    #[must_use]
    pub fn same_states(&self, other: &Self) -> bool
    where
        S: PartialEq,
    {
        self.in_states == other.in_states && self.out_states == other.out_states
    }
}
