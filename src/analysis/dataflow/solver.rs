//! Worklist-based data flow solver.
//!
//! # Algorithm
//!
//! 1. Initialize every block from [`DataFlowAnalysis::initialize`] (or from prior results)
//! 2. Add every block to the worklist, reachable blocks first in reverse postorder (forward)
//!    or postorder (backward)
//! 3. While the worklist is non-empty:
//!    a. Remove a block from the worklist
//!    b. Merge the neighbor states into the block's merge-side state
//!    c. Apply the transfer function to get the far-side state
//!    d. If the far-side state changed, enqueue the neighbors in the propagation direction
//!       that are not already queued
//!
//! Termination follows from the analysis being monotone over a finite state space.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    analysis::{
        dataflow::framework::{AnalysisResults, DataFlowAnalysis, Direction},
        ControlFlowGraph,
    },
    ir::Function,
    utils::graph::{algorithms::postorder, NodeId},
    Result,
};

/// Worklist-based data flow solver.
///
/// # Usage
///
/// ```rust
/// use tacopt::analysis::{dataflow::{DataFlowSolver, LiveVariables}, ControlFlowGraph};
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("f")
///     .constant("x", 1)
///     .label("use")
///     .effect("print", &["x"])
///     .ret(None)
///     .build();
/// let cfg = ControlFlowGraph::build(&function)?;
/// let results = DataFlowSolver::new(LiveVariables).solve(&cfg);
/// assert!(results.out_states[0].contains("x"));
/// # Ok::<(), tacopt::Error>(())
/// ```
pub struct DataFlowSolver<A: DataFlowAnalysis> {
    analysis: A,
    in_states: Vec<A::State>,
    out_states: Vec<A::State>,
    worklist: VecDeque<usize>,
    in_worklist: Vec<bool>,
    iterations: usize,
}

impl<A: DataFlowAnalysis> DataFlowSolver<A> {
    /// Creates a new solver for the given analysis.
    #[must_use]
    pub fn new(analysis: A) -> Self {
        Self {
            analysis,
            in_states: Vec::new(),
            out_states: Vec::new(),
            worklist: VecDeque::new(),
            in_worklist: Vec::new(),
            iterations: 0,
        }
    }

    /// Solves the analysis to a fixpoint starting from the analysis' initial states.
    pub fn solve(mut self, cfg: &ControlFlowGraph) -> AnalysisResults<A::State> {
        let (in_states, out_states): (Vec<_>, Vec<_>) = (0..cfg.block_count())
            .map(|index| self.analysis.initialize(cfg, NodeId::new(index)))
            .unzip();
        self.in_states = in_states;
        self.out_states = out_states;
        self.run(cfg)
    }

    /// Solves the analysis to a fixpoint starting from previously computed states.
    ///
    /// Resuming from a fixpoint changes nothing: every block is processed exactly once.
    /// If `prior` does not cover every block of `cfg`, the analysis starts from scratch.
    pub fn resume(
        mut self,
        cfg: &ControlFlowGraph,
        prior: AnalysisResults<A::State>,
    ) -> AnalysisResults<A::State> {
        if prior.in_states.len() != cfg.block_count()
            || prior.out_states.len() != cfg.block_count()
        {
            return self.solve(cfg);
        }
        self.in_states = prior.in_states;
        self.out_states = prior.out_states;
        self.run(cfg)
    }

    fn run(mut self, cfg: &ControlFlowGraph) -> AnalysisResults<A::State> {
        let block_count = cfg.block_count();
        if block_count == 0 {
            return AnalysisResults::new(Vec::new(), Vec::new());
        }

        self.seed(cfg);

        while let Some(index) = self.worklist.pop_front() {
            self.in_worklist[index] = false;
            self.iterations += 1;

            let changed = match A::DIRECTION {
                Direction::Forward => self.process_forward(index, cfg),
                Direction::Backward => self.process_backward(index, cfg),
            };

            if changed {
                trace!(block = cfg.name(NodeId::new(index)), "dataflow state changed");
                self.add_affected_to_worklist(index, cfg);
            }
        }

        debug!(
            function = cfg.function_name(),
            blocks = block_count,
            iterations = self.iterations,
            direction = ?A::DIRECTION,
            "dataflow reached fixpoint"
        );

        AnalysisResults {
            in_states: self.in_states,
            out_states: self.out_states,
            iterations: self.iterations,
        }
    }

    fn seed(&mut self, cfg: &ControlFlowGraph) {
        let block_count = cfg.block_count();
        self.in_worklist = vec![false; block_count];
        self.worklist.clear();

        let mut order = postorder(cfg, cfg.entry());
        if A::DIRECTION == Direction::Forward {
            order.reverse();
        }
        // Unreachable blocks still get a state
        order.extend((0..block_count).map(NodeId::new));

        for node in order {
            let index = node.index();
            if !self.in_worklist[index] {
                self.worklist.push_back(index);
                self.in_worklist[index] = true;
            }
        }
    }

    /// Returns `true` if the output state changed.
    fn process_forward(&mut self, index: usize, cfg: &ControlFlowGraph) -> bool {
        let node = NodeId::new(index);
        let neighbors: Vec<&A::State> = cfg
            .predecessors(node)
            .iter()
            .map(|pred| &self.out_states[pred.index()])
            .collect();
        let input = self.analysis.merge(&self.in_states[index], &neighbors);

        let block = &cfg.blocks()[index];
        let output = self.analysis.transfer(&input, &block.name, &block.instrs);
        self.in_states[index] = input;

        let changed = output != self.out_states[index];
        self.out_states[index] = output;
        changed
    }

    /// Returns `true` if the input state changed.
    fn process_backward(&mut self, index: usize, cfg: &ControlFlowGraph) -> bool {
        let node = NodeId::new(index);
        let neighbors: Vec<&A::State> = cfg
            .successors(node)
            .iter()
            .map(|succ| &self.in_states[succ.index()])
            .collect();
        let output = self.analysis.merge(&self.out_states[index], &neighbors);

        let block = &cfg.blocks()[index];
        let input = self.analysis.transfer(&output, &block.name, &block.instrs);
        self.out_states[index] = output;

        let changed = input != self.in_states[index];
        self.in_states[index] = input;
        changed
    }

    fn add_affected_to_worklist(&mut self, index: usize, cfg: &ControlFlowGraph) {
        let node = NodeId::new(index);
        let affected = match A::DIRECTION {
            Direction::Forward => cfg.successors(node),
            Direction::Backward => cfg.predecessors(node),
        };
        for next in affected {
            let next = next.index();
            if !self.in_worklist[next] {
                self.worklist.push_back(next);
                self.in_worklist[next] = true;
            }
        }
    }
}

/// Builds the control flow graph of `function` and solves `analysis` over it.
///
/// # Errors
///
/// Returns [`Error::Malformed`](crate::Error::Malformed) if the graph cannot be built.
pub fn run_dataflow<A: DataFlowAnalysis>(
    function: &Function,
    analysis: A,
) -> Result<AnalysisResults<A::State>> {
    let cfg = ControlFlowGraph::build(function)?;
    Ok(DataFlowSolver::new(analysis).solve(&cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Instruction};

    /// Counts instructions along the longest acyclic prefix, saturating at a cap.
    struct Distance;

    impl DataFlowAnalysis for Distance {
        type State = u32;
        const DIRECTION: Direction = Direction::Forward;

        fn initialize(&self, _cfg: &ControlFlowGraph, _block: NodeId) -> (u32, u32) {
            (0, 0)
        }

        fn merge(&self, existing: &u32, neighbors: &[&u32]) -> u32 {
            neighbors.iter().copied().copied().fold(*existing, u32::max)
        }

        fn transfer(&self, input: &u32, _block: &str, instrs: &[Instruction]) -> u32 {
            let len = u32::try_from(instrs.len()).unwrap_or(u32::MAX);
            input.saturating_add(len).min(100)
        }
    }

    #[test]
    fn test_forward_propagation_through_loop() {
        let function = FunctionBuilder::new("f")
            .constant("x", 1)
            .label("loop")
            .jump("loop")
            .build();
        let results = run_dataflow(&function, Distance).unwrap();
        assert_eq!(results.out_states[0], 1);
        assert_eq!(results.out_states[1], 100);
    }

    #[test]
    fn test_empty_function() {
        let results = run_dataflow(&Function::new("empty"), Distance).unwrap();
        assert_eq!(results.block_count(), 0);
        assert_eq!(results.iterations, 0);
    }

    #[test]
    fn test_resume_from_fixpoint_is_stable() {
        let function = FunctionBuilder::new("f")
            .constant_bool("c", true)
            .branch("c", "a", "b")
            .label("a")
            .jump("c")
            .label("b")
            .label("c")
            .ret(None)
            .build();
        let cfg = ControlFlowGraph::build(&function).unwrap();
        let first = DataFlowSolver::new(Distance).solve(&cfg);
        let second = DataFlowSolver::new(Distance).resume(&cfg, first.clone());
        assert!(first.same_states(&second));
        assert_eq!(second.iterations, cfg.block_count());
    }
}
