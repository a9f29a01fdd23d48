//! # tacopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the tacopt library. Import this module to get quick access to the IR, the analyses
//! and the pass pipeline.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all tacopt operations
pub use crate::Error;

/// The result type used throughout tacopt
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Programs, functions and instructions
pub use crate::ir::{
    count_constants, Argument, Function, FunctionBuilder, Instruction, Literal, Operation,
    Program, Type,
};

// ================================================================================================
// Analyses
// ================================================================================================

/// Control flow graphs and loops
pub use crate::analysis::cfg::{
    BasicBlock, CfgOptions, ControlFlowGraph, LoopForest, LoopInfo,
};

/// The per-function analysis cache
pub use crate::analysis::{Analysis, AnalysisKind};

/// Dataflow framework and the built-in analyses
pub use crate::analysis::dataflow::{
    run_dataflow, AnalysisResults, DataFlowAnalysis, DataFlowSolver, Direction, LiveVariables,
    ReachingDefinitions,
};

/// SSA conversion
pub use crate::analysis::ssa::{convert_from_ssa, convert_to_ssa, verify_ssa};

/// Dominance
pub use crate::utils::graph::{
    algorithms::{compute_dominators, DominanceFrontier, DominatorSets, DominatorTree},
    NodeId,
};

// ================================================================================================
// Passes
// ================================================================================================

/// Pipeline, passes and configuration
pub use crate::compiler::{
    find_and_optimize_loops, EventKind, EventLog, FunctionPass, PassKind, Pipeline,
    PipelineConfig,
};

// ================================================================================================
// Emulation
// ================================================================================================

/// Reference interpreter
pub use crate::emulation::{Interpreter, Value};
