// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # tacopt
//!
//! A compiler middle-end toolkit for a small typed three-address instruction-list IR.
//!
//! Functions arrive as flat instruction lists of labels and operations. `tacopt` turns them into
//! control flow graphs, computes dominance information, runs dataflow analyses on a generic
//! worklist engine, converts functions into (and out of) static single assignment form and
//! hoists loop-invariant computations into loop preheaders.
//!
//! # Architecture
//!
//! - [`ir`] - Programs, functions, instructions and the exchange-format record shape
//! - [`utils::graph`] - Node identifiers, graph traits, traversals and dominator computation
//! - [`analysis`] - CFG construction, loops, dataflow, SSA and the per-function [`Analysis`](analysis::Analysis) cache
//! - [`compiler`] - Passes, the selector-driven [`Pipeline`](compiler::Pipeline), configuration and the event log
//! - [`emulation`] - A reference interpreter used to check that transformations preserve behavior
//!
//! # Quick Start
//!
//! ```rust
//! use tacopt::prelude::*;
//!
//! let function = FunctionBuilder::new("main")
//!     .constant("n", 3)
//!     .constant("one", 1)
//!     .label("loop")
//!     .op("sub", "n", &["n", "one"])
//!     .op("gt", "again", &["n", "one"])
//!     .branch("again", "loop", "done")
//!     .label("done")
//!     .ret(None)
//!     .build();
//!
//! let mut analysis = Analysis::new();
//! let loops = analysis.loops(&function)?;
//! assert_eq!(loops.len(), 1);
//! # Ok::<(), tacopt::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias over the crate-wide [`Error`] type.
//! Errors abort the processing of the function they were raised for; nothing is retried.

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod compiler;
pub mod emulation;
pub mod ir;
pub mod prelude;
pub mod utils;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
