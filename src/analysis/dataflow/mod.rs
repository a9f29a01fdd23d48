//! Data flow analysis framework.
//!
//! # Architecture
//!
//! - [`DataFlowAnalysis`]: Specifies initial states, the merge operator and transfer functions
//! - [`DataFlowSolver`]: Iteratively computes fixpoints using a worklist algorithm
//! - [`run_dataflow`]: Builds a CFG for a function and solves an analysis over it
//!
//! # Analyses Provided
//!
//! - [`ReachingDefinitions`]: Which blocks' definitions may reach each block boundary
//! - [`LiveVariables`]: Which variables are live at each block boundary

mod framework;
mod liveness;
mod reaching;
mod solver;

pub use framework::{AnalysisResults, DataFlowAnalysis, Direction};
pub use liveness::{LiveSet, LiveVariables};
pub use reaching::{DefinitionMap, ReachingDefinitions};
pub use solver::{run_dataflow, DataFlowSolver};
