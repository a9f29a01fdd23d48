//! Control Flow Graph (CFG) construction and loop analysis.
//!
//! # Key Components
//!
//! - [`split_blocks`] - Splits a flat instruction list into basic blocks
//! - [`ControlFlowGraph`] - Arena of [`BasicBlock`]s with successor and predecessor lists
//! - [`detect_loops`] - Natural loop detection producing a [`LoopForest`]
//!
//! # Block Boundaries
//!
//! A label starts a block and `jmp`, `br` and `ret` end one. A block without a terminator
//! falls through to the next block in layout order.
//!
//! # Examples
//!
//! ```rust
//! use tacopt::analysis::ControlFlowGraph;
//! use tacopt::ir::FunctionBuilder;
//!
//! let function = FunctionBuilder::new("f")
//!     .constant_bool("c", true)
//!     .branch("c", "then", "else")
//!     .label("then")
//!     .jump("end")
//!     .label("else")
//!     .label("end")
//!     .ret(None)
//!     .build();
//!
//! let cfg = ControlFlowGraph::build(&function)?;
//! for node in cfg.reverse_postorder() {
//!     println!("{} -> {:?}", cfg.name(node), cfg.successors(node));
//! }
//! # Ok::<(), tacopt::Error>(())
//! ```

mod block;
mod graph;
mod loops;

pub use block::{split_blocks, BasicBlock};
pub(crate) use graph::unique_name;
pub use graph::{CfgOptions, ControlFlowGraph};
pub use loops::{detect_loops, find_loop_body, LoopExit, LoopForest, LoopInfo};
