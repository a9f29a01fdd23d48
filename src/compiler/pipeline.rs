//! Selector-driven pass pipeline.
//!
//! The [`Pipeline`] runs an ordered list of passes over every function of a [`Program`].
//! Each function gets its own [`Analysis`] cache; after every pass that changes the function,
//! the pipeline invalidates that cache so later passes never observe stale results.
//!
//! Passes and analyses are selected by name. Names are parsed into [`PassKind`] and
//! [`AnalysisKind`]; a name that is neither is an [`Error::UnknownSelector`].
//!
//! # Examples
//!
//! ```rust
//! use tacopt::compiler::Pipeline;
//! use tacopt::ir::{FunctionBuilder, Program};
//!
//! let mut program = Program {
//!     functions: vec![FunctionBuilder::new("main")
//!         .constant_bool("c", true)
//!         .branch("c", "left", "right")
//!         .label("left")
//!         .constant("x", 1)
//!         .jump("join")
//!         .label("right")
//!         .constant("x", 2)
//!         .label("join")
//!         .effect("print", &["x"])
//!         .ret(None)
//!         .build()],
//! };
//!
//! let pipeline = Pipeline::from_selectors(&["ssa"])?;
//! let report = pipeline.run(&mut program)?;
//! assert_eq!(report.changed_functions, vec!["main".to_string()]);
//! # Ok::<(), tacopt::Error>(())
//! ```

use tracing::{debug, trace};

use crate::{
    analysis::{Analysis, AnalysisKind, CfgOptions},
    compiler::{EventKind, EventLog, FunctionPass, PassContext, PassKind, PipelineConfig},
    emulation::Interpreter,
    ir::{Function, Program},
    Error, Result,
};

/// Parses pass selectors such as `"licm"` or `"to_ssa"`.
///
/// # Errors
///
/// Returns [`Error::UnknownSelector`] for the first name that is not a pass.
pub fn parse_passes<S: AsRef<str>>(selectors: &[S]) -> Result<Vec<PassKind>> {
    selectors
        .iter()
        .map(|selector| {
            let selector = selector.as_ref();
            selector
                .parse()
                .map_err(|_| Error::UnknownSelector(selector.to_string()))
        })
        .collect()
}

/// Parses analysis selectors such as `"dominators"` or `"liveness"`.
///
/// # Errors
///
/// Returns [`Error::UnknownSelector`] for the first name that is not an analysis.
pub fn parse_analyses<S: AsRef<str>>(selectors: &[S]) -> Result<Vec<AnalysisKind>> {
    selectors
        .iter()
        .map(|selector| {
            let selector = selector.as_ref();
            selector
                .parse()
                .map_err(|_| Error::UnknownSelector(selector.to_string()))
        })
        .collect()
}

/// Summary of one [`Pipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Number of functions processed.
    pub functions: usize,
    /// Names of the functions at least one pass changed, in program order.
    pub changed_functions: Vec<String>,
    /// Number of pass invocations (skipped passes are not counted).
    pub pass_runs: usize,
}

/// Runs a fixed sequence of passes over programs.
pub struct Pipeline {
    config: PipelineConfig,
    passes: Vec<Box<dyn FunctionPass>>,
    events: EventLog,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Creates a pipeline running the passes listed in `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let passes = config.passes.iter().map(|kind| kind.create()).collect();
        Self {
            config,
            passes,
            events: EventLog::new(),
        }
    }

    /// Creates a pipeline with default settings running the named passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSelector`] if a name is not a known pass.
    pub fn from_selectors<S: AsRef<str>>(selectors: &[S]) -> Result<Self> {
        Ok(Self::new(PipelineConfig {
            passes: parse_passes(selectors)?,
            ..PipelineConfig::default()
        }))
    }

    /// Appends a custom pass after the configured ones.
    #[must_use]
    pub fn with_pass(mut self, pass: Box<dyn FunctionPass>) -> Self {
        self.passes.push(pass);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the names of the passes, in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Returns the events recorded so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Moves the recorded events out of the pipeline.
    pub fn take_events(&mut self) -> EventLog {
        self.events.take()
    }

    /// Creates an empty analysis cache configured like the pipeline's own.
    #[must_use]
    pub fn new_analysis(&self) -> Analysis {
        Analysis::with_options(CfgOptions {
            qualify_names: self.config.qualify_block_names,
        })
    }

    /// Creates a reference interpreter with the configured step limit.
    #[must_use]
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::with_step_limit(self.config.emulation_step_limit)
    }

    /// Runs every pass over every function of `program`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass; processing stops at that function.
    pub fn run(&self, program: &mut Program) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        for function in &mut program.functions {
            let mut analysis = self.new_analysis();
            let (changed, runs) = self.run_passes(function, &mut analysis)?;
            report.functions += 1;
            report.pass_runs += runs;
            if changed {
                report.changed_functions.push(function.name.clone());
            }
        }

        debug!(
            functions = report.functions,
            changed = report.changed_functions.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Runs every pass over one function using the caller's cache.
    ///
    /// Returns `true` if any pass changed the function.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass.
    pub fn run_function(&self, function: &mut Function, analysis: &mut Analysis) -> Result<bool> {
        self.run_passes(function, analysis).map(|(changed, _)| changed)
    }

    fn run_passes(&self, function: &mut Function, analysis: &mut Analysis) -> Result<(bool, usize)> {
        let ctx = PassContext {
            config: &self.config,
            events: &self.events,
        };
        let mut changed = false;
        let mut runs = 0;

        for pass in &self.passes {
            if !pass.should_run(function) {
                trace!(pass = pass.name(), function = function.name.as_str(), "skipped");
                continue;
            }

            self.events
                .record(EventKind::PassStarted)
                .function(function.name.as_str())
                .message(pass.name());

            let pass_changed = pass.run_on_function(function, analysis, &ctx)?;
            runs += 1;
            if pass_changed {
                analysis.invalidate();
                changed = true;
            }

            self.events
                .record(EventKind::PassCompleted)
                .function(function.name.as_str())
                .message(if pass_changed {
                    format!("{} (changed)", pass.name())
                } else {
                    pass.name().to_string()
                });
            debug!(
                pass = pass.name(),
                function = function.name.as_str(),
                changed = pass_changed,
                "pass completed"
            );
        }

        Ok((changed, runs))
    }

    /// Computes the named analyses for every function of `program`.
    ///
    /// Returns one populated cache per function, in program order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSelector`] for an unknown name (before anything is computed),
    /// or the first error raised while computing.
    pub fn analyze<S: AsRef<str>>(&self, program: &Program, selectors: &[S]) -> Result<Vec<Analysis>> {
        let kinds = parse_analyses(selectors)?;

        program
            .functions
            .iter()
            .map(|function| {
                let mut analysis = self.new_analysis();
                for &kind in &kinds {
                    if analysis.is_cached(kind) {
                        continue;
                    }
                    analysis.ensure(function, kind)?;
                    self.events
                        .record(EventKind::AnalysisComputed)
                        .function(function.name.as_str())
                        .message(kind.to_string());
                }
                Ok(analysis)
            })
            .collect()
    }
}
