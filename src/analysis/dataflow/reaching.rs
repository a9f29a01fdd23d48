//! Reaching definitions analysis.
//!
//! A definition of `v` in block `B` *reaches* a point `p` if there is a path from the end of
//! `B` to `p` along which `v` is not redefined. This analysis works at block granularity: the
//! state maps each variable to the set of block names whose last definition of it may reach.
//!
//! - `IN[B]`  = `IN[B]` ∪ ⋃{`OUT[P]` | P is a predecessor of B}
//! - `OUT[B]` = `IN[B]` with every variable defined in B replaced by `{B}`
//!
//! Keeping `IN[B]` in the union preserves the boundary state of the entry block, where the
//! function arguments are defined.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{
        dataflow::framework::{DataFlowAnalysis, Direction},
        ControlFlowGraph,
    },
    ir::{Function, Instruction},
    utils::graph::NodeId,
};

/// Variable name to the names of the blocks whose definitions may reach.
pub type DefinitionMap = BTreeMap<String, BTreeSet<String>>;

/// Reaching definitions analysis (forward).
///
/// # Example
///
/// ```rust
/// use tacopt::analysis::dataflow::{run_dataflow, ReachingDefinitions};
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("f")
///     .arg("n", "int")
///     .constant("x", 1)
///     .label("next")
///     .ret(Some("x"))
///     .build();
///
/// let results = run_dataflow(&function, ReachingDefinitions::new(&function))?;
/// let at_next = &results.in_states[1];
/// assert!(at_next["x"].contains("entry"));
/// assert!(at_next["n"].contains("entry"));
/// # Ok::<(), tacopt::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReachingDefinitions {
    arguments: Vec<String>,
}

impl ReachingDefinitions {
    /// Creates the analysis for a function; its arguments are defined at entry.
    #[must_use]
    pub fn new(function: &Function) -> Self {
        Self {
            arguments: function.arg_names().map(str::to_string).collect(),
        }
    }

    /// Creates the analysis with an explicit list of variables defined at entry.
    #[must_use]
    pub fn with_arguments(arguments: Vec<String>) -> Self {
        Self { arguments }
    }
}

impl DataFlowAnalysis for ReachingDefinitions {
    type State = DefinitionMap;
    const DIRECTION: Direction = Direction::Forward;

    fn initialize(&self, cfg: &ControlFlowGraph, block: NodeId) -> (DefinitionMap, DefinitionMap) {
        if block != cfg.entry() {
            return (DefinitionMap::new(), DefinitionMap::new());
        }
        let entry = cfg.name(block).to_string();
        let boundary: DefinitionMap = self
            .arguments
            .iter()
            .map(|arg| (arg.clone(), BTreeSet::from([entry.clone()])))
            .collect();
        (boundary, DefinitionMap::new())
    }

    fn merge(&self, existing: &DefinitionMap, neighbors: &[&DefinitionMap]) -> DefinitionMap {
        let mut merged = existing.clone();
        for state in neighbors {
            for (variable, blocks) in *state {
                merged
                    .entry(variable.clone())
                    .or_default()
                    .extend(blocks.iter().cloned());
            }
        }
        merged
    }

    fn transfer(&self, input: &DefinitionMap, block: &str, instrs: &[Instruction]) -> DefinitionMap {
        let mut output = input.clone();
        for dest in instrs.iter().filter_map(Instruction::dest) {
            output.insert(dest.to_string(), BTreeSet::from([block.to_string()]));
        }
        output
    }
}
