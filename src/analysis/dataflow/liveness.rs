//! Live variable analysis.
//!
//! A variable is *live* at a program point if there exists a path from that
//! point to a use of the variable that doesn't pass through a definition of
//! the variable.
//!
//! This is a backward data flow analysis:
//!
//! - `OUT[B]` = ∪{`IN[S]` | S is a successor of B}
//! - `IN[B]`  = walk B in reverse from `OUT[B]`, removing each destination and then adding
//!   each operand
//!
//! Phi operands are treated as uses in the block holding the phi.

use std::collections::BTreeSet;

use crate::{
    analysis::{
        dataflow::framework::{DataFlowAnalysis, Direction},
        ControlFlowGraph,
    },
    ir::Instruction,
    utils::graph::NodeId,
};

/// The set of live variable names.
pub type LiveSet = BTreeSet<String>;

/// Live variable analysis (backward).
///
/// # Example
///
/// ```rust
/// use tacopt::analysis::dataflow::{run_dataflow, LiveVariables};
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("f")
///     .arg("a", "int")
///     .constant("unused", 1)
///     .label("exit")
///     .ret(Some("a"))
///     .build();
///
/// let results = run_dataflow(&function, LiveVariables)?;
/// assert!(results.in_states[0].contains("a"));
/// assert!(!results.in_states[0].contains("unused"));
/// # Ok::<(), tacopt::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveVariables;

impl DataFlowAnalysis for LiveVariables {
    type State = LiveSet;
    const DIRECTION: Direction = Direction::Backward;

    fn initialize(&self, _cfg: &ControlFlowGraph, _block: NodeId) -> (LiveSet, LiveSet) {
        (LiveSet::new(), LiveSet::new())
    }

    fn merge(&self, _existing: &LiveSet, neighbors: &[&LiveSet]) -> LiveSet {
        let mut merged = LiveSet::new();
        for state in neighbors {
            merged.extend(state.iter().cloned());
        }
        merged
    }

    fn transfer(&self, input: &LiveSet, _block: &str, instrs: &[Instruction]) -> LiveSet {
        let mut live = input.clone();
        for instr in instrs.iter().rev() {
            if let Some(dest) = instr.dest() {
                live.remove(dest);
            }
            live.extend(instr.args().iter().cloned());
        }
        live
    }
}
