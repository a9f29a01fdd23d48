//! Reference interpreter for functions.
//!
//! This module executes functions directly from their instruction lists. It is the oracle
//! used to check that transformations preserve behavior: running a function before and after
//! a pass must print the same lines and return the same value.
//!
//! # Key Components
//!
//! - [`crate::emulation::Interpreter`] - Instruction dispatch loop with a step budget
//! - [`crate::emulation::Execution`] - Output, final bindings and return value of a run
//! - [`crate::emulation::Value`] - Runtime value representation
//!
//! # Usage Examples
//!
//! ```rust
//! use tacopt::emulation::Interpreter;
//! use tacopt::ir::FunctionBuilder;
//!
//! let function = FunctionBuilder::new("main")
//!     .constant("x", 4)
//!     .effect("print", &["x"])
//!     .build();
//!
//! let execution = Interpreter::new().run(&function, &[])?;
//! assert_eq!(execution.output, vec!["4".to_string()]);
//! # Ok::<(), tacopt::Error>(())
//! ```

mod engine;
mod value;

pub use engine::{Execution, Interpreter, DEFAULT_STEP_LIMIT};
pub use value::Value;
