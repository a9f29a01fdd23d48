//! SSA construction.
//!
//! # Algorithm Overview
//!
//! Construction proceeds in four phases:
//!
//! 1. **Normalisation**: Drop unreachable blocks, give the entry block a label and, if the entry
//!    can be re-entered, splice a fresh label-only block ahead of it so arguments have a
//!    predecessor-free definition point
//! 2. **Phi Placement**: Insert phis at merge blocks reached by more than one definition
//!    (see [`place_phis`])
//! 3. **Variable Renaming**: Walk the dominator tree with per-variable name stacks
//! 4. **Materialisation**: Emit phis as `phi` operations and every block with its label
//!
//! The dominator tree walk uses an explicit stack of enter/exit frames rather than recursion,
//! so deep trees cannot overflow the call stack.
//!
//! # Naming
//!
//! Every definition of `v` receives a fresh name `v.N`, numbering each variable from zero and
//! skipping names that already occur in the function. Arguments keep their names.
//!
//! # Usage
//!
//! ```rust
//! use tacopt::analysis::{ssa::{convert_to_ssa, verify_ssa}, Analysis};
//! use tacopt::ir::FunctionBuilder;
//!
//! let mut function = FunctionBuilder::new("f")
//!     .constant_bool("c", true)
//!     .branch("c", "left", "right")
//!     .label("left")
//!     .constant("x", 1)
//!     .jump("join")
//!     .label("right")
//!     .constant("x", 2)
//!     .jump("join")
//!     .label("join")
//!     .ret(Some("x"))
//!     .build();
//!
//! let report = convert_to_ssa(&mut function, &mut Analysis::new())?;
//! assert_eq!(report.phis_inserted, 1);
//! verify_ssa(&function)?;
//! # Ok::<(), tacopt::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    analysis::{
        cfg::unique_name,
        ssa::phi::{phi_counts, place_phis, PhiNode},
        Analysis, ControlFlowGraph,
    },
    ir::{Function, Instruction, Type},
    utils::graph::{algorithms::DominatorTree, NodeId},
    Error, Result,
};

/// Summary of one SSA conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsaReport {
    /// Number of phis inserted.
    pub phis_inserted: usize,
    /// Number of phis inserted per original variable.
    pub phis_per_variable: BTreeMap<String, usize>,
    /// Number of definitions that received a fresh name (phis excluded).
    pub renamed: usize,
    /// Names of the unreachable blocks that were dropped.
    pub removed_blocks: Vec<String>,
    /// Label given to a previously unlabelled entry block.
    pub entry_label: Option<String>,
    /// Label of the block spliced ahead of a re-enterable entry block.
    pub spliced_entry: Option<String>,
}

impl SsaReport {
    /// Returns `true` if the conversion left the function untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Converts a function into SSA form in place.
///
/// Results stored in `analysis` are used and refreshed along the way. Once the function has
/// been rewritten the cache is invalidated, since none of its results describe the new body.
///
/// # Arguments
///
/// * `function` - The function to convert; its body is replaced on success
/// * `analysis` - The analysis cache belonging to `function`
///
/// # Errors
///
/// - [`Error::Malformed`] if the body has a bad jump target or already contains phis
/// - [`Error::UndefinedVariable`] if some use has no reaching definition
/// - [`Error::SsaStackMismatch`] if renaming leaves the name stacks out of balance
pub fn convert_to_ssa(function: &mut Function, analysis: &mut Analysis) -> Result<SsaReport> {
    if function.instrs.is_empty() {
        return Ok(SsaReport::default());
    }
    if let Some(phi) = function
        .instrs
        .iter()
        .filter_map(Instruction::as_operation)
        .find(|op| op.is_phi())
    {
        return Err(malformed_error!(
            "function '{}' already contains phi operations ({})",
            function.name,
            phi
        ));
    }

    let result = SsaBuilder::build(function, analysis);
    analysis.invalidate();

    let (instrs, report) = result?;
    function.instrs = instrs;
    debug!(
        function = function.name.as_str(),
        phis = report.phis_inserted,
        renamed = report.renamed,
        removed = report.removed_blocks.len(),
        "converted to SSA"
    );
    Ok(report)
}

/// A frame of the explicit dominator tree walk.
enum Frame {
    /// Rename the block, then schedule its exit and its children.
    Enter(NodeId),
    /// Pop the names pushed by the block and check the stack depths.
    Exit {
        node: NodeId,
        pushed: Vec<String>,
        depths: HashMap<String, usize>,
    },
}

/// State of one SSA conversion.
struct SsaBuilder {
    /// Block labels, indexed by block id.
    labels: Vec<String>,
    /// Block bodies without their labels, rewritten in place during renaming.
    bodies: Vec<Vec<Instruction>>,
    /// Phis per block, filled in during renaming.
    phis: Vec<Vec<PhiNode>>,
    /// Current SSA name stack per original variable.
    stacks: HashMap<String, Vec<String>>,
    /// Next version number per original variable.
    next_version: HashMap<String, usize>,
    /// Every name in use, so fresh names never collide.
    taken: HashSet<String>,
    /// The declared type of each original variable.
    types: HashMap<String, Type>,
    renamed: usize,
}

impl SsaBuilder {
    fn build(function: &Function, analysis: &mut Analysis) -> Result<(Vec<Instruction>, SsaReport)> {
        let mut report = SsaReport::default();

        let cfg = analysis.cfg(function)?;
        let working = normalize(function, &cfg, &mut report);
        drop(cfg);

        let working = match working {
            Some(instrs) => {
                analysis.invalidate();
                Function {
                    instrs,
                    ..function.clone()
                }
            }
            None => function.clone(),
        };

        let cfg = analysis.cfg(&working)?;
        let tree = analysis.dominator_tree(&working)?;
        let reaching = analysis.reaching_definitions(&working)?;

        let phis = place_phis(&cfg, &reaching);
        report.phis_per_variable = phi_counts(&phis);
        report.phis_inserted = report.phis_per_variable.values().sum();

        let mut builder = SsaBuilder::new(&working, &cfg, phis);
        builder.rename(&cfg, &tree)?;
        report.renamed = builder.renamed;

        Ok((builder.materialize(), report))
    }

    fn new(function: &Function, cfg: &ControlFlowGraph, phis: Vec<Vec<PhiNode>>) -> Self {
        let labels = cfg
            .blocks()
            .iter()
            .map(|block| block.source_label().to_string())
            .collect();
        let bodies = cfg
            .blocks()
            .iter()
            .map(|block| {
                block
                    .instrs
                    .iter()
                    .filter(|instr| instr.as_label().is_none())
                    .cloned()
                    .collect()
            })
            .collect();

        let mut types = HashMap::new();
        for argument in function.args.iter().flatten() {
            types
                .entry(argument.name.clone())
                .or_insert_with(|| argument.ty.clone());
        }
        for op in function.instrs.iter().filter_map(Instruction::as_operation) {
            if let (Some(dest), Some(ty)) = (&op.dest, &op.ty) {
                types.entry(dest.clone()).or_insert_with(|| ty.clone());
            }
        }

        // Arguments are live on entry under their own names
        let stacks = function
            .arg_names()
            .map(|arg| (arg.to_string(), vec![arg.to_string()]))
            .collect();

        Self {
            labels,
            bodies,
            phis,
            stacks,
            next_version: HashMap::new(),
            taken: function.variables().into_iter().collect(),
            types,
            renamed: 0,
        }
    }

    /// Mints a fresh name for `variable` and pushes it on the variable's stack.
    fn new_def(&mut self, variable: &str) -> String {
        let version = self.next_version.entry(variable.to_string()).or_insert(0);
        let name = loop {
            let candidate = format!("{variable}.{version}");
            *version += 1;
            if !self.taken.contains(&candidate) {
                break candidate;
            }
        };
        self.taken.insert(name.clone());
        self.stacks
            .entry(variable.to_string())
            .or_default()
            .push(name.clone());
        name
    }

    fn current_def(&self, variable: &str) -> Option<&String> {
        self.stacks.get(variable).and_then(|stack| stack.last())
    }

    fn depths(&self) -> HashMap<String, usize> {
        self.stacks
            .iter()
            .map(|(variable, stack)| (variable.clone(), stack.len()))
            .collect()
    }

    /// Renames every block reachable in the dominator tree from the entry.
    fn rename(&mut self, cfg: &ControlFlowGraph, tree: &DominatorTree) -> Result<()> {
        let mut stack = vec![Frame::Enter(tree.entry())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    let depths = self.depths();
                    let pushed = self.rename_block(cfg, node)?;
                    stack.push(Frame::Exit {
                        node,
                        pushed,
                        depths,
                    });
                    // Reversed so children are visited in id order
                    for &child in tree.children(node).iter().rev() {
                        stack.push(Frame::Enter(child));
                    }
                }
                Frame::Exit {
                    node,
                    pushed,
                    depths,
                } => self.leave_block(node, &pushed, &depths)?,
            }
        }

        Ok(())
    }

    /// Renames the phis and operations of one block and fills the successor phis.
    ///
    /// Returns the variables pushed, one entry per push.
    fn rename_block(&mut self, cfg: &ControlFlowGraph, node: NodeId) -> Result<Vec<String>> {
        let index = node.index();
        let mut pushed = Vec::new();

        let phi_variables: Vec<String> = self.phis[index]
            .iter()
            .map(|phi| phi.variable.clone())
            .collect();
        for (slot, variable) in phi_variables.iter().enumerate() {
            let name = self.new_def(variable);
            self.phis[index][slot].dest = Some(name);
            pushed.push(variable.clone());
        }

        let mut body = std::mem::take(&mut self.bodies[index]);
        for instr in &mut body {
            let Some(op) = instr.as_operation_mut() else {
                continue;
            };
            for arg in &mut op.args {
                let Some(current) = self.current_def(arg) else {
                    return Err(Error::UndefinedVariable {
                        variable: arg.clone(),
                        block: self.labels[index].clone(),
                    });
                };
                *arg = current.clone();
            }
            if let Some(dest) = op.dest.take() {
                let name = self.new_def(&dest);
                trace!(variable = dest.as_str(), ssa = name.as_str(), "renamed definition");
                op.dest = Some(name);
                pushed.push(dest);
                self.renamed += 1;
            }
        }
        self.bodies[index] = body;

        let label = self.labels[index].clone();
        for &succ in cfg.successors(node) {
            let mut phis = std::mem::take(&mut self.phis[succ.index()]);
            for phi in &mut phis {
                if let Some(current) = self.current_def(&phi.variable) {
                    phi.fill(&label, current);
                }
            }
            self.phis[succ.index()] = phis;
        }

        Ok(pushed)
    }

    fn leave_block(
        &mut self,
        node: NodeId,
        pushed: &[String],
        depths: &HashMap<String, usize>,
    ) -> Result<()> {
        for variable in pushed {
            if let Some(stack) = self.stacks.get_mut(variable) {
                stack.pop();
            }
        }

        for (variable, stack) in &self.stacks {
            let expected = depths.get(variable).copied().unwrap_or(0);
            if stack.len() != expected {
                return Err(Error::SsaStackMismatch {
                    block: self.labels[node.index()].clone(),
                    variable: variable.clone(),
                    expected,
                    found: stack.len(),
                });
            }
        }
        Ok(())
    }

    /// Emits every block as its label, its phis and its renamed operations.
    fn materialize(self) -> Vec<Instruction> {
        let mut instrs = Vec::new();
        for ((label, phis), body) in self.labels.into_iter().zip(self.phis).zip(self.bodies) {
            instrs.push(Instruction::label(label));
            for phi in &phis {
                let ty = self.types.get(&phi.variable).cloned();
                instrs.push(phi.to_operation(ty).into());
            }
            instrs.extend(body);
        }
        instrs
    }
}

/// Rewrites a body so every block is reachable and labelled and the entry has no predecessors.
///
/// Returns `None` if the body already has that shape.
fn normalize(
    function: &Function,
    cfg: &ControlFlowGraph,
    report: &mut SsaReport,
) -> Option<Vec<Instruction>> {
    let reachable = cfg.reachable();
    let mut taken: HashSet<String> = function.labels().map(str::to_string).collect();
    let mut instrs = Vec::with_capacity(function.instrs.len() + 2);

    for (index, block) in cfg.blocks().iter().enumerate() {
        let node = NodeId::new(index);
        if !reachable.contains(&node) {
            report.removed_blocks.push(block.name.clone());
            continue;
        }
        // Only the entry can be reachable without a label
        if block.label.is_none() {
            let label = unique_name("entry", &taken);
            taken.insert(label.clone());
            instrs.push(Instruction::label(label.as_str()));
            report.entry_label = Some(label);
        }
        instrs.extend(block.instrs.iter().cloned());
    }

    // Unconditional: the function start only becomes an incoming edge once the block exists
    if !cfg.is_empty() && !cfg.predecessors(cfg.entry()).is_empty() {
        let label = unique_name("entry", &taken);
        instrs.insert(0, Instruction::label(label.as_str()));
        report.spliced_entry = Some(label);
    }

    let changed = !report.removed_blocks.is_empty()
        || report.entry_label.is_some()
        || report.spliced_entry.is_some();
    changed.then_some(instrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::verify_ssa,
        ir::{FunctionBuilder, Operation},
        test::{diamond, self_loop},
    };

    fn phis_of<'a>(function: &'a Function, block: &str) -> Vec<&'a Operation> {
        let mut in_block = false;
        let mut phis = Vec::new();
        for instr in &function.instrs {
            match instr {
                Instruction::Label { name } => in_block = name == block,
                Instruction::Operation(op) if in_block && op.is_phi() => phis.push(op),
                Instruction::Operation(_) => {}
            }
        }
        phis
    }

    #[test]
    fn test_diamond_single_phi() {
        let mut function = diamond();
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert_eq!(report.phis_inserted, 1);
        assert_eq!(report.phis_per_variable["x"], 1);
        assert_eq!(report.entry_label.as_deref(), Some("entry"));

        let phis = phis_of(&function, "join");
        assert_eq!(phis.len(), 1);
        assert_eq!(phis[0].labels, vec!["left".to_string(), "right".to_string()]);
        assert_eq!(phis[0].args, vec!["x.0".to_string(), "x.1".to_string()]);
        assert_eq!(phis[0].dest.as_deref(), Some("x.2"));
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_arguments_keep_names() {
        let mut function = FunctionBuilder::new("f")
            .arg("a", "int")
            .op("add", "a", &["a", "a"])
            .ret(Some("a"))
            .build();
        convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        let add = function.instrs[1].as_operation().unwrap();
        assert_eq!(add.args, vec!["a".to_string(), "a".to_string()]);
        assert_eq!(add.dest.as_deref(), Some("a.0"));
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_undefined_variable() {
        let mut function = FunctionBuilder::new("f")
            .op("add", "y", &["x", "x"])
            .ret(None)
            .build();
        let err = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { ref variable, .. } if variable == "x"));
    }

    #[test]
    fn test_fresh_names_skip_existing() {
        let mut function = FunctionBuilder::new("f")
            .constant("x.0", 7)
            .constant("x", 1)
            .op("add", "y", &["x", "x.0"])
            .ret(Some("y"))
            .build();
        convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        let dests: Vec<&str> = function.instrs.iter().filter_map(Instruction::dest).collect();
        assert_eq!(dests, vec!["x.0.0", "x.1", "y.0"]);
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_unreachable_blocks_dropped() {
        let mut function = FunctionBuilder::new("f")
            .constant("x", 1)
            .ret(Some("x"))
            .label("dead")
            .op("add", "x", &["x", "x"])
            .ret(Some("x"))
            .build();
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert_eq!(report.removed_blocks, vec!["dead".to_string()]);
        assert!(function.labels().all(|label| label != "dead"));
    }

    #[test]
    fn test_reentered_entry_is_spliced() {
        let mut function = FunctionBuilder::new("f")
            .arg("n", "int")
            .label("top")
            .constant("one", 1)
            .op("sub", "n", &["n", "one"])
            .op("gt", "again", &["n", "one"])
            .branch("again", "top", "done")
            .label("done")
            .ret(Some("n"))
            .build();
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert_eq!(report.spliced_entry.as_deref(), Some("entry"));
        assert_eq!(function.instrs[0].as_label(), Some("entry"));

        let phis = phis_of(&function, "top");
        let n_phi = phis
            .iter()
            .find(|phi| phi.dest.as_deref().is_some_and(|d| d.starts_with("n.")))
            .unwrap();
        assert_eq!(n_phi.labels, vec!["entry".to_string(), "top".to_string()]);
        assert_eq!(n_phi.args[0], "n");
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_reentered_entry_spliced_without_phis() {
        let mut function = FunctionBuilder::new("f")
            .label("top")
            .constant_bool("c", false)
            .branch("c", "top", "done")
            .label("done")
            .ret(None)
            .build();
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert_eq!(report.spliced_entry.as_deref(), Some("entry"));
        assert_eq!(report.phis_inserted, 0);
        let labels: Vec<&str> = function.labels().collect();
        assert_eq!(labels, vec!["entry", "top", "done"]);
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_loop_header_phi() {
        let mut function = self_loop();
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert!(report.phis_per_variable.contains_key("i"));
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_existing_phi_rejected() {
        let mut function = FunctionBuilder::new("f")
            .label("a")
            .phi("x", "int", &[("y", "a")])
            .ret(None)
            .build();
        let err = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn test_empty_function_untouched() {
        let mut function = Function::new("empty");
        let report = convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert!(report.is_empty());
        assert!(function.instrs.is_empty());
    }

    #[test]
    fn test_cache_invalidated_after_conversion() {
        let mut function = diamond();
        let mut analysis = Analysis::new();
        convert_to_ssa(&mut function, &mut analysis).unwrap();
        assert!(analysis.cached().is_empty());
    }
}
