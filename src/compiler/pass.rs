//! The pass trait.

use crate::{
    analysis::Analysis,
    compiler::{EventLog, PipelineConfig},
    ir::Function,
    Result,
};

/// Shared state handed to every pass invocation.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// The pipeline configuration.
    pub config: &'a PipelineConfig,
    /// Where passes record what they changed.
    pub events: &'a EventLog,
}

/// A transformation over one function.
///
/// Passes receive the function together with its analysis cache. A pass that changes the
/// function's instructions must report it by returning `true`; the pipeline then invalidates
/// the cache. Passes may invalidate the cache themselves when they need fresh results
/// part-way through.
pub trait FunctionPass {
    /// Unique name for logging and selection.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Should this pass run on a specific function?
    ///
    /// Called before `run_on_function`. Override to skip functions the pass has nothing to do
    /// for.
    fn should_run(&self, _function: &Function) -> bool {
        true
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if any changes were made, `false` otherwise.
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Arguments
    ///
    /// * `function` - The function to transform.
    /// * `analysis` - The function's analysis cache.
    /// * `ctx` - Configuration and event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the function.
    fn run_on_function(
        &self,
        function: &mut Function,
        analysis: &mut Analysis,
        ctx: &PassContext<'_>,
    ) -> Result<bool>;
}
