//! SSA conversion passes.

use crate::{
    analysis::{
        ssa::{convert_from_ssa, convert_to_ssa, verify_ssa},
        Analysis,
    },
    compiler::{EventKind, FunctionPass, PassContext},
    ir::{Function, Instruction},
    Result,
};

fn has_phis(function: &Function) -> bool {
    function
        .instrs
        .iter()
        .filter_map(Instruction::as_operation)
        .any(|op| op.is_phi())
}

/// Converts functions into SSA form.
#[derive(Debug, Default)]
pub struct ToSsaPass;

impl ToSsaPass {
    /// Creates a new SSA construction pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for ToSsaPass {
    fn name(&self) -> &'static str {
        "to_ssa"
    }

    fn description(&self) -> &'static str {
        "Places phis from reaching definitions and renames every definition"
    }

    fn should_run(&self, function: &Function) -> bool {
        !function.instrs.is_empty() && !has_phis(function)
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analysis: &mut Analysis,
        ctx: &PassContext<'_>,
    ) -> Result<bool> {
        let report = convert_to_ssa(function, analysis)?;

        for block in &report.removed_blocks {
            ctx.events
                .record(EventKind::BlockRemoved)
                .function(function.name.as_str())
                .block(block.as_str())
                .message("unreachable");
        }
        if let Some(label) = &report.spliced_entry {
            ctx.events
                .record(EventKind::Info)
                .function(function.name.as_str())
                .block(label.as_str())
                .message("spliced ahead of the re-entered entry block");
        }
        for (variable, count) in &report.phis_per_variable {
            ctx.events
                .record(EventKind::PhiInserted)
                .function(function.name.as_str())
                .message(format!("{count} phi(s) for '{variable}'"));
        }
        if report.renamed > 0 {
            ctx.events
                .record(EventKind::VariableRenamed)
                .function(function.name.as_str())
                .message(format!("{} definitions renamed", report.renamed));
        }

        if ctx.config.verify_ssa {
            verify_ssa(function)?;
        }
        Ok(true)
    }
}

/// Lowers phis into copies.
#[derive(Debug, Default)]
pub struct FromSsaPass;

impl FromSsaPass {
    /// Creates a new SSA destruction pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for FromSsaPass {
    fn name(&self) -> &'static str {
        "from_ssa"
    }

    fn description(&self) -> &'static str {
        "Replaces phis by copies at the end of their predecessors"
    }

    fn should_run(&self, function: &Function) -> bool {
        has_phis(function)
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _analysis: &mut Analysis,
        ctx: &PassContext<'_>,
    ) -> Result<bool> {
        let removed = convert_from_ssa(function)?;
        if removed > 0 {
            ctx.events
                .record(EventKind::PhiRemoved)
                .function(function.name.as_str())
                .message(format!("{removed} phi(s) lowered to copies"));
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::{EventLog, PipelineConfig},
        test::diamond,
    };

    #[test]
    fn test_to_ssa_records_events() {
        let config = PipelineConfig::default();
        let events = EventLog::new();
        let ctx = PassContext {
            config: &config,
            events: &events,
        };
        let mut function = diamond();
        let pass = ToSsaPass::new();
        assert!(pass.should_run(&function));
        assert!(pass
            .run_on_function(&mut function, &mut Analysis::new(), &ctx)
            .unwrap());
        assert_eq!(events.count(EventKind::PhiInserted), 1);
        assert!(!pass.should_run(&function));

        let from = FromSsaPass::new();
        assert!(from.should_run(&function));
        assert!(from
            .run_on_function(&mut function, &mut Analysis::new(), &ctx)
            .unwrap());
        assert_eq!(events.count(EventKind::PhiRemoved), 1);
        assert!(!from.should_run(&function));
    }
}
