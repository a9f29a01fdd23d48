//! Transformation passes and the pipeline that runs them.
//!
//! This module sits on top of [`crate::analysis`]:
//!
//! - [`crate::analysis`] - CFG, dominance, dataflow, SSA construction, the analysis cache
//! - [`compiler`](self) - Passes over functions, the pipeline, configuration, change tracking
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Pipeline                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PipelineConfig              Pass list, block naming, limits     │
//! │                                                                  │
//! │  Per function:                                                   │
//! │    Analysis                  Fresh cache, invalidated after      │
//! │                              every pass that changes the body    │
//! │    FunctionPass              should_run() / run_on_function()    │
//! │      ├─ to_ssa               Phi placement + renaming            │
//! │      ├─ from_ssa             Phis lowered to copies              │
//! │      └─ licm                 Invariants hoisted to preheaders    │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod events;
mod pass;
mod passes;
mod pipeline;

pub use config::PipelineConfig;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::{FunctionPass, PassContext};
pub use passes::{
    find_and_optimize_loops, FromSsaPass, HoistedInstruction, LicmPass, LicmReport, PassKind,
    ToSsaPass,
};
pub use pipeline::{parse_analyses, parse_passes, Pipeline, PipelineReport};
