//! Static single assignment form.
//!
//! # Architecture
//!
//! - [`convert_to_ssa`] - Places phis from reaching definitions and renames every definition
//!   with a dominator tree walk
//! - [`convert_from_ssa`] - Lowers phis back into copies at the end of their predecessors
//! - [`verify_ssa`] - Checks the single assignment property
//! - [`place_phis`] / [`PhiNode`] - Phi placement, usable on its own for diagnostics

mod builder;
mod destruct;
mod phi;

pub use builder::{convert_to_ssa, SsaReport};
pub use destruct::{convert_from_ssa, verify_ssa};
pub use phi::{phi_counts, place_phis, PhiNode, PhiSlot};
