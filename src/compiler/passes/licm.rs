//! Loop Invariant Code Motion (LICM) Pass.
//!
//! This pass moves computations that produce the same value on every iteration out of loops
//! and into a freshly created preheader block.
//!
//! # Algorithm
//!
//! An instruction inside a loop is loop-invariant if it is pure and either:
//! 1. It is a `const`, OR
//! 2. For every operand, all reaching definitions lie outside the loop, OR exactly one
//!    definition reaches and it is itself a loop-invariant instruction of the loop
//!
//! Invariance is computed to a fixpoint. A loop-invariant instruction defining `d` can be
//! hoisted if:
//! 1. Its block dominates every use of `d` (an earlier position suffices within the block)
//! 2. `d` has no other definition in the function and is not an argument
//! 3. Its block dominates every exiting block of the loop (a body block with a successor
//!    outside the loop)
//!
//! Hoisted instructions whose operands depend on in-loop definitions that are not hoisted
//! themselves are dropped from the set, so the preheader never reads a value it cannot see.
//!
//! # Preheader
//!
//! ```text
//! // Before LICM
//! entry:
//!     i = const 0
//!     jmp loop
//! loop:
//!     ten = const 10     // Loop invariant!
//!     i = add i one
//!     c = lt i ten
//!     br c loop exit
//!
//! // After LICM
//! entry:
//!     i = const 0
//!     jmp loop_preheader
//! loop_preheader:
//!     ten = const 10     // Hoisted
//! loop:
//!     i = add i one
//!     c = lt i ten
//!     br c loop exit
//! ```
//!
//! The preheader is laid out immediately before the header and falls through into it. Every
//! jump to the header from outside the loop is redirected to the preheader, and a body block
//! that used to fall through into the header gets an explicit `jmp`.
//!
//! Loops are processed from the innermost outward. After each change the analyses are rebuilt,
//! so code hoisted into an inner preheader can continue outward.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    analysis::{
        cfg::unique_name,
        dataflow::{AnalysisResults, DataFlowAnalysis, DataFlowSolver, Direction},
        Analysis, ControlFlowGraph, LoopInfo,
    },
    compiler::{EventKind, FunctionPass, PassContext},
    ir::{Function, Instruction, Operation, OP_JMP},
    utils::graph::{algorithms::DominatorSets, NodeId},
    Result,
};

/// An instruction position: block and index within the block's instructions.
type Site = (NodeId, usize);

/// Where a reaching value was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum DefSite {
    /// A function argument, defined on entry.
    Argument,
    /// An instruction.
    At(Site),
}

type SiteMap = BTreeMap<String, BTreeSet<DefSite>>;

/// Reaching definitions at instruction granularity.
struct ReachingSites<'a> {
    cfg: &'a ControlFlowGraph,
    arguments: Vec<String>,
}

impl<'a> ReachingSites<'a> {
    fn new(function: &Function, cfg: &'a ControlFlowGraph) -> Self {
        Self {
            cfg,
            arguments: function.arg_names().map(str::to_string).collect(),
        }
    }
}

impl DataFlowAnalysis for ReachingSites<'_> {
    type State = SiteMap;
    const DIRECTION: Direction = Direction::Forward;

    fn initialize(&self, cfg: &ControlFlowGraph, block: NodeId) -> (SiteMap, SiteMap) {
        let mut input = SiteMap::new();
        if block == cfg.entry() {
            for argument in &self.arguments {
                input
                    .entry(argument.clone())
                    .or_default()
                    .insert(DefSite::Argument);
            }
        }
        (input, SiteMap::new())
    }

    fn merge(&self, existing: &SiteMap, neighbors: &[&SiteMap]) -> SiteMap {
        let mut merged = existing.clone();
        for state in neighbors {
            for (variable, sites) in *state {
                merged
                    .entry(variable.clone())
                    .or_default()
                    .extend(sites.iter().copied());
            }
        }
        merged
    }

    fn transfer(&self, input: &SiteMap, block: &str, instrs: &[Instruction]) -> SiteMap {
        let Some(node) = self.cfg.id(block) else {
            return input.clone();
        };
        let mut output = input.clone();
        for (index, instr) in instrs.iter().enumerate() {
            if let Some(dest) = instr.dest() {
                output.insert(dest.to_string(), BTreeSet::from([DefSite::At((node, index))]));
            }
        }
        output
    }
}

/// An instruction moved out of a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistedInstruction {
    /// Label of the loop header.
    pub header: String,
    /// The block the instruction was taken from.
    pub block: String,
    /// The preheader it was moved to.
    pub preheader: String,
    /// The instruction text.
    pub instruction: String,
}

/// Outcome of [`find_and_optimize_loops`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicmReport {
    /// Every hoisted instruction, in the order it was moved.
    pub hoisted: Vec<HoistedInstruction>,
    /// Labels of the created preheaders.
    pub preheaders: Vec<String>,
    /// Number of analyse-and-rewrite rounds performed.
    pub iterations: usize,
}

impl LicmReport {
    /// Returns `true` if nothing was hoisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hoisted.is_empty()
    }
}

/// A single loop's transformed instruction list.
struct LoopRewrite {
    instrs: Vec<Instruction>,
    preheader: String,
    hoisted: Vec<HoistedInstruction>,
}

/// Hoists loop-invariant instructions of `function` into preheaders.
///
/// Each round rebuilds the CFG, dominators and loops from `analysis`, rewrites the innermost
/// loop that has something to hoist, and invalidates the cache. Rounds stop when no loop
/// changes or after `max_iterations`.
///
/// # Errors
///
/// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::Analysis;
/// use tacopt::compiler::find_and_optimize_loops;
/// use tacopt::ir::FunctionBuilder;
///
/// let mut function = FunctionBuilder::new("main")
///     .constant("i", 0)
///     .constant("one", 1)
///     .jump("loop")
///     .label("loop")
///     .constant("ten", 10)
///     .op("add", "i", &["i", "one"])
///     .op("lt", "c", &["i", "ten"])
///     .branch("c", "loop", "exit")
///     .label("exit")
///     .ret(None)
///     .build();
///
/// let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 8)?;
/// assert_eq!(report.preheaders, vec!["loop_preheader".to_string()]);
/// assert_eq!(report.hoisted.len(), 1);
/// # Ok::<(), tacopt::Error>(())
/// ```
pub fn find_and_optimize_loops(
    function: &mut Function,
    analysis: &mut Analysis,
    max_iterations: usize,
) -> Result<LicmReport> {
    let mut report = LicmReport::default();

    while report.iterations < max_iterations {
        report.iterations += 1;

        let cfg = analysis.cfg(function)?;
        let forest = analysis.loops(function)?;
        if forest.is_empty() {
            break;
        }
        let dominators = analysis.dominators(function)?;
        let sites = DataFlowSolver::new(ReachingSites::new(function, &cfg)).solve(&cfg);

        let optimizer = LoopOptimizer::new(function, &cfg, &dominators, &sites);
        let rewrite = forest
            .by_depth_descending()
            .into_iter()
            .find_map(|info| optimizer.optimize(info));
        let Some(rewrite) = rewrite else {
            break;
        };

        debug!(
            function = function.name.as_str(),
            preheader = rewrite.preheader.as_str(),
            hoisted = rewrite.hoisted.len(),
            "hoisted loop-invariant instructions"
        );
        function.instrs = rewrite.instrs;
        report.preheaders.push(rewrite.preheader);
        report.hoisted.extend(rewrite.hoisted);
        analysis.invalidate();
    }

    Ok(report)
}

/// Per-round view of one function for deciding what a loop may hoist.
struct LoopOptimizer<'a> {
    function: &'a Function,
    cfg: &'a ControlFlowGraph,
    dominators: &'a DominatorSets,
    sites: &'a AnalysisResults<SiteMap>,
    definitions: HashMap<&'a str, usize>,
    arguments: HashSet<&'a str>,
}

impl<'a> LoopOptimizer<'a> {
    fn new(
        function: &'a Function,
        cfg: &'a ControlFlowGraph,
        dominators: &'a DominatorSets,
        sites: &'a AnalysisResults<SiteMap>,
    ) -> Self {
        let mut definitions: HashMap<&str, usize> = HashMap::new();
        for dest in function.instrs.iter().filter_map(Instruction::dest) {
            *definitions.entry(dest).or_insert(0) += 1;
        }
        Self {
            function,
            cfg,
            dominators,
            sites,
            definitions,
            arguments: function.arg_names().collect(),
        }
    }

    fn instruction(&self, (node, index): Site) -> Option<&'a Instruction> {
        self.cfg.block(node).and_then(|block| block.instrs.get(index))
    }

    /// Returns the definitions of `variable` reaching the instruction at `site`.
    fn reaching(&self, (node, index): Site, variable: &str) -> BTreeSet<DefSite> {
        let Some(block) = self.cfg.block(node) else {
            return BTreeSet::new();
        };
        let local = block.instrs[..index]
            .iter()
            .rposition(|instr| instr.dest() == Some(variable));
        if let Some(local) = local {
            return BTreeSet::from([DefSite::At((node, local))]);
        }
        self.sites
            .in_state(node)
            .and_then(|state| state.get(variable))
            .cloned()
            .unwrap_or_default()
    }

    fn is_outside(info: &LoopInfo, site: DefSite) -> bool {
        match site {
            DefSite::Argument => true,
            DefSite::At((node, _)) => !info.contains(node),
        }
    }

    /// Computes the loop-invariant instructions of a loop.
    fn invariants(&self, info: &LoopInfo) -> BTreeSet<Site> {
        let mut invariant = BTreeSet::new();
        let mut changed = true;

        while changed {
            changed = false;
            for &node in &info.body {
                let Some(block) = self.cfg.block(node) else {
                    continue;
                };
                for (index, instr) in block.instrs.iter().enumerate() {
                    let site = (node, index);
                    if invariant.contains(&site) {
                        continue;
                    }
                    let Some(op) = instr.as_operation() else {
                        continue;
                    };
                    if op.is_pure() && self.is_invariant(info, &invariant, site, op) {
                        invariant.insert(site);
                        changed = true;
                    }
                }
            }
        }

        invariant
    }

    fn is_invariant(
        &self,
        info: &LoopInfo,
        invariant: &BTreeSet<Site>,
        site: Site,
        op: &Operation,
    ) -> bool {
        if op.is_const() {
            return true;
        }
        op.args.iter().all(|arg| {
            let defs = self.reaching(site, arg);
            if defs.is_empty() {
                return false;
            }
            if defs.iter().all(|&def| Self::is_outside(info, def)) {
                return true;
            }
            match (defs.len(), defs.first()) {
                (1, Some(DefSite::At(def))) => invariant.contains(def),
                _ => false,
            }
        })
    }

    /// Returns `true` if the definition at `site` dominates every use of `dest`.
    fn dominates_uses(&self, (node, index): Site, dest: &str) -> bool {
        for (position, block) in self.cfg.blocks().iter().enumerate() {
            let user = NodeId::new(position);
            if !self.dominators.is_reachable(user) {
                continue;
            }
            for (k, op) in block
                .instrs
                .iter()
                .enumerate()
                .filter_map(|(k, instr)| instr.as_operation().map(|op| (k, op)))
            {
                if op.is_phi() {
                    // A phi reads its operand at the end of the matching predecessor.
                    for (arg, label) in op.args.iter().zip(&op.labels) {
                        if arg != dest {
                            continue;
                        }
                        let pred = self
                            .cfg
                            .blocks()
                            .iter()
                            .position(|b| b.label.as_deref() == Some(label.as_str()));
                        match pred {
                            Some(pred) if self.dominators.dominates(node, NodeId::new(pred)) => {}
                            _ => return false,
                        }
                    }
                } else if op.args.iter().any(|arg| arg == dest) {
                    let dominated = if user == node {
                        k > index
                    } else {
                        self.dominators.dominates(node, user)
                    };
                    if !dominated {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn can_hoist(&self, info: &LoopInfo, site: Site) -> bool {
        let Some(dest) = self.instruction(site).and_then(Instruction::dest) else {
            return false;
        };
        if self.arguments.contains(dest) || self.definitions.get(dest) != Some(&1) {
            return false;
        }
        if !info
            .exiting_blocks()
            .iter()
            .all(|&exiting| self.dominators.dominates(site.0, exiting))
        {
            return false;
        }
        self.dominates_uses(site, dest)
    }

    /// Removes candidates reading an in-loop definition that stays behind.
    fn close_over_operands(&self, info: &LoopInfo, candidates: &mut BTreeSet<Site>) {
        loop {
            let stranded: Vec<Site> = candidates
                .iter()
                .copied()
                .filter(|&site| {
                    self.instruction(site).is_some_and(|instr| {
                        instr.args().iter().any(|arg| {
                            self.reaching(site, arg).iter().any(|def| match def {
                                DefSite::At(def) => {
                                    info.contains(def.0) && !candidates.contains(def)
                                }
                                DefSite::Argument => false,
                            })
                        })
                    })
                })
                .collect();
            if stranded.is_empty() {
                return;
            }
            for site in stranded {
                candidates.remove(&site);
            }
        }
    }

    /// Rewrites the function with one loop's invariants hoisted, if there are any.
    fn optimize(&self, info: &LoopInfo) -> Option<LoopRewrite> {
        let header_block = self.cfg.block(info.header)?;
        let header_label = header_block.label.clone()?;

        let mut candidates: BTreeSet<Site> = self
            .invariants(info)
            .into_iter()
            .filter(|&site| self.can_hoist(info, site))
            .collect();
        self.close_over_operands(info, &mut candidates);
        if candidates.is_empty() {
            return None;
        }

        let outside: Vec<NodeId> = self
            .cfg
            .predecessors(info.header)
            .iter()
            .copied()
            .filter(|&pred| !info.contains(pred))
            .collect();

        // Header phis can only follow the preheader when a single outside edge feeds them.
        let phi_source = if header_block.operations().any(Operation::is_phi) {
            let reachable: Vec<NodeId> = outside
                .iter()
                .copied()
                .filter(|&pred| self.dominators.is_reachable(pred))
                .collect();
            let [single] = reachable.as_slice() else {
                trace!(
                    header = header_label.as_str(),
                    "skipping loop with phis and several outside predecessors"
                );
                return None;
            };
            Some(self.cfg.block(*single)?.label.clone()?)
        } else {
            None
        };

        let taken: HashSet<String> = self.function.labels().map(str::to_string).collect();
        let preheader = unique_name(&format!("{header_label}_preheader"), &taken);

        let rpo: HashMap<NodeId, usize> = self
            .cfg
            .reverse_postorder()
            .into_iter()
            .enumerate()
            .map(|(position, node)| (node, position))
            .collect();
        // Candidate blocks are ordered by dominance, so reverse postorder puts definitions
        // before their uses even when the layout does not
        let mut order: Vec<Site> = candidates.iter().copied().collect();
        order.sort_by_key(|&(node, index)| (rpo.get(&node).copied().unwrap_or(usize::MAX), index));

        let hoisted: Vec<HoistedInstruction> = order
            .iter()
            .filter_map(|&site| {
                Some(HoistedInstruction {
                    header: header_label.clone(),
                    block: self.cfg.name(site.0).to_string(),
                    preheader: preheader.clone(),
                    instruction: self.instruction(site)?.as_operation()?.to_string(),
                })
            })
            .collect();

        let mut instrs = Vec::with_capacity(self.function.instrs.len() + 2);
        for (position, block) in self.cfg.blocks().iter().enumerate() {
            let node = NodeId::new(position);
            if node == info.header {
                instrs.push(Instruction::label(preheader.clone()));
                instrs.extend(order.iter().filter_map(|&site| self.instruction(site).cloned()));
            }

            let mut body: Vec<Instruction> = block
                .instrs
                .iter()
                .enumerate()
                .filter(|(index, _)| !candidates.contains(&(node, *index)))
                .map(|(_, instr)| instr.clone())
                .collect();

            if info.contains(node) {
                if let (true, Some(source)) = (node == info.header, &phi_source) {
                    for op in body.iter_mut().filter_map(Instruction::as_operation_mut) {
                        if op.is_phi() {
                            retarget(op, source, &preheader);
                        }
                    }
                }
                if position + 1 == info.header.index() && block.terminator().is_none() {
                    let mut jump = Operation::new(OP_JMP);
                    jump.labels.push(header_label.clone());
                    body.push(Instruction::Operation(jump));
                }
            } else if let Some(op) = body.last_mut().and_then(Instruction::as_operation_mut) {
                if op.is_jump() {
                    retarget(op, &header_label, &preheader);
                }
            }

            instrs.extend(body);
        }

        Some(LoopRewrite {
            instrs,
            preheader,
            hoisted,
        })
    }
}

fn retarget(op: &mut Operation, from: &str, to: &str) {
    for label in op.labels.iter_mut().filter(|label| label.as_str() == from) {
        *label = to.to_string();
    }
}

/// Loop-invariant code motion.
#[derive(Debug, Default)]
pub struct LicmPass;

impl LicmPass {
    /// Creates a new LICM pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for LicmPass {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn description(&self) -> &'static str {
        "Moves loop-invariant computations into loop preheaders"
    }

    fn should_run(&self, function: &Function) -> bool {
        function
            .instrs
            .iter()
            .filter_map(Instruction::as_operation)
            .any(Operation::is_jump)
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analysis: &mut Analysis,
        ctx: &PassContext<'_>,
    ) -> Result<bool> {
        let report = find_and_optimize_loops(function, analysis, ctx.config.max_iterations)?;

        for preheader in &report.preheaders {
            ctx.events
                .record(EventKind::PreheaderInserted)
                .function(function.name.as_str())
                .block(preheader.as_str());
        }
        for hoisted in &report.hoisted {
            ctx.events
                .record(EventKind::InstructionHoisted)
                .function(function.name.as_str())
                .block(hoisted.block.as_str())
                .message(format!("{} -> {}", hoisted.instruction, hoisted.preheader));
        }
        if !report.is_empty() {
            ctx.events
                .record(EventKind::Info)
                .function(function.name.as_str())
                .message(format!(
                    "LICM: hoisted {} loop-invariant instructions",
                    report.hoisted.len()
                ));
        }

        Ok(!report.is_empty())
    }
}
