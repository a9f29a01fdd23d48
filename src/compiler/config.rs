//! Configuration for the pass pipeline.
//!
//! This module provides [`PipelineConfig`], which controls pass selection, block naming,
//! iteration limits and verification.

use serde::{Deserialize, Serialize};

use crate::{compiler::PassKind, emulation::DEFAULT_STEP_LIMIT};

/// Configuration for the [`Pipeline`](crate::compiler::Pipeline).
///
/// # Examples
///
/// ```rust
/// use tacopt::compiler::{PassKind, PipelineConfig};
///
/// let config = PipelineConfig {
///     max_iterations: 4,
///     ..PipelineConfig::ssa_roundtrip()
/// };
/// assert_eq!(config.passes, vec![PassKind::ToSsa, PassKind::FromSsa]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Passes to run on every function, in order (default: LICM).
    pub passes: Vec<PassKind>,

    /// Prefix block names with the function name (default: false).
    ///
    /// Only the names reported by analyses change; labels in the instructions never do.
    pub qualify_block_names: bool,

    /// Maximum number of rebuild-and-retry rounds for iterative transforms such as LICM
    /// (default: 16).
    pub max_iterations: usize,

    /// Check the single assignment property after SSA construction (default: true).
    pub verify_ssa: bool,

    /// Instruction budget for the reference interpreter (default: 1,000,000).
    pub emulation_step_limit: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: vec![PassKind::Licm],
            qualify_block_names: false,
            max_iterations: 16,
            verify_ssa: true,
            emulation_step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that runs no passes, for analysis-only use.
    #[must_use]
    pub fn analysis_only() -> Self {
        Self {
            passes: Vec::new(),
            ..Self::default()
        }
    }

    /// Creates a configuration that converts every function into SSA form.
    #[must_use]
    pub fn ssa() -> Self {
        Self {
            passes: vec![PassKind::ToSsa],
            ..Self::default()
        }
    }

    /// Creates a configuration that converts into SSA form and straight back out.
    #[must_use]
    pub fn ssa_roundtrip() -> Self {
        Self {
            passes: vec![PassKind::ToSsa, PassKind::FromSsa],
            ..Self::default()
        }
    }

    /// Creates a configuration that hoists loop invariants and then converts into SSA form.
    #[must_use]
    pub fn optimize() -> Self {
        Self {
            passes: vec![PassKind::Licm, PassKind::ToSsa],
            ..Self::default()
        }
    }
}
