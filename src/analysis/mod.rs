//! Program analysis infrastructure for three-address functions.
//!
//! This module builds upon the generic graph infrastructure in [`crate::utils::graph`] to
//! provide the IR-specific analyses the passes in [`crate::compiler`] depend on.
//!
//! # Architecture
//!
//! The analysis module is organized into focused sub-modules:
//!
//! - [`cfg`] - Control Flow Graph construction and natural loop detection
//! - [`dataflow`] - Generic worklist solver with reaching definitions and liveness
//! - [`ssa`] - Conversion into and out of static single assignment form
//! - [`Analysis`] - Per-function cache memoizing all of the above
//!
//! # Usage
//!
//! ```rust
//! use tacopt::analysis::Analysis;
//! use tacopt::ir::FunctionBuilder;
//!
//! let function = FunctionBuilder::new("f")
//!     .constant_bool("c", true)
//!     .branch("c", "then", "done")
//!     .label("then")
//!     .jump("done")
//!     .label("done")
//!     .ret(None)
//!     .build();
//!
//! let mut analysis = Analysis::new();
//! let cfg = analysis.cfg(&function)?;
//! let dominators = analysis.dominators(&function)?;
//! let done = cfg.id("done").unwrap();
//! assert!(dominators.dominates(cfg.entry(), done));
//! # Ok::<(), tacopt::Error>(())
//! ```

mod cache;
pub mod cfg;
pub mod dataflow;
pub mod ssa;

// Re-export primary types at module level
pub use cache::{Analysis, AnalysisKind, CacheStats};
pub use cfg::{BasicBlock, CfgOptions, ControlFlowGraph, LoopForest, LoopInfo};
