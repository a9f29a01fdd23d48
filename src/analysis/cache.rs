//! Per-function analysis cache.
//!
//! Building a CFG, computing dominators or solving a dataflow problem is comparatively
//! expensive, and most passes need several of these results at once. [`Analysis`] holds
//! whichever results have been computed for one function; each accessor computes its
//! prerequisites first, stores its own result and returns the stored value on later calls.
//!
//! # Invalidation
//!
//! The cache never notices that a function changed. Whoever rewrites a function's
//! instructions must call [`Analysis::invalidate`] before asking for results again.
//!
//! # Examples
//!
//! ```rust
//! use std::rc::Rc;
//! use tacopt::analysis::{Analysis, AnalysisKind};
//! use tacopt::ir::FunctionBuilder;
//!
//! let function = FunctionBuilder::new("f").constant("x", 1).ret(Some("x")).build();
//! let mut analysis = Analysis::new();
//!
//! let first = analysis.dominators(&function)?;
//! let second = analysis.dominators(&function)?;
//! assert!(Rc::ptr_eq(&first, &second));
//! assert_eq!(analysis.stats().count(AnalysisKind::Cfg), 1);
//! assert_eq!(analysis.stats().count(AnalysisKind::Dominators), 1);
//! # Ok::<(), tacopt::Error>(())
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::trace;

use crate::{
    analysis::{
        cfg::{detect_loops, BasicBlock, CfgOptions, ControlFlowGraph, LoopForest},
        dataflow::{
            AnalysisResults, DataFlowSolver, DefinitionMap, LiveSet, LiveVariables,
            ReachingDefinitions,
        },
    },
    ir::Function,
    utils::graph::algorithms::{
        compute_dominators, DominanceFrontier, DominatorSets, DominatorTree,
    },
    Result,
};

/// The analyses an [`Analysis`] cache can hold.
///
/// Parsed from the selector names used by the pipeline, e.g. `"dominance_frontier"`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Basic blocks with their successor and predecessor lists.
    #[strum(to_string = "cfg", serialize = "blocks")]
    Cfg,
    /// Successor lists (computed with the CFG).
    Successors,
    /// Predecessor lists (computed with the CFG).
    Predecessors,
    /// Dominator sets.
    #[strum(to_string = "dominators", serialize = "dom")]
    Dominators,
    /// Dominator tree.
    DominatorTree,
    /// Dominance frontiers.
    DominanceFrontier,
    /// Reaching definitions.
    ReachingDefinitions,
    /// Live variables.
    Liveness,
    /// Natural loops.
    Loops,
}

/// Number of times each analysis was computed by a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    computed: BTreeMap<AnalysisKind, usize>,
}

impl CacheStats {
    /// Returns how many times `kind` was computed.
    #[must_use]
    pub fn count(&self, kind: AnalysisKind) -> usize {
        self.computed.get(&kind).copied().unwrap_or(0)
    }

    /// Returns the total number of computations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.computed.values().sum()
    }

    fn record(&mut self, kind: AnalysisKind) {
        *self.computed.entry(kind).or_insert(0) += 1;
    }
}

/// Memoized analyses of a single function.
///
/// Results are handed out as [`Rc`]s so a pass can hold several of them at once.
#[derive(Debug, Default)]
pub struct Analysis {
    options: CfgOptions,
    cfg: Option<Rc<ControlFlowGraph>>,
    dominators: Option<Rc<DominatorSets>>,
    dominator_tree: Option<Rc<DominatorTree>>,
    dominance_frontier: Option<Rc<DominanceFrontier>>,
    reaching_definitions: Option<Rc<AnalysisResults<DefinitionMap>>>,
    liveness: Option<Rc<AnalysisResults<LiveSet>>>,
    loops: Option<Rc<LoopForest>>,
    stats: CacheStats,
}

impl Analysis {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache whose CFGs are built with `options`.
    #[must_use]
    pub fn with_options(options: CfgOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the computation counters.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns `true` if `kind` is currently stored.
    #[must_use]
    pub fn is_cached(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Cfg | AnalysisKind::Successors | AnalysisKind::Predecessors => {
                self.cfg.is_some()
            }
            AnalysisKind::Dominators => self.dominators.is_some(),
            AnalysisKind::DominatorTree => self.dominator_tree.is_some(),
            AnalysisKind::DominanceFrontier => self.dominance_frontier.is_some(),
            AnalysisKind::ReachingDefinitions => self.reaching_definitions.is_some(),
            AnalysisKind::Liveness => self.liveness.is_some(),
            AnalysisKind::Loops => self.loops.is_some(),
        }
    }

    /// Returns the kinds currently stored.
    #[must_use]
    pub fn cached(&self) -> BTreeSet<AnalysisKind> {
        AnalysisKind::iter()
            .filter(|&kind| self.is_cached(kind))
            .collect()
    }

    /// Discards every stored result. Counters are kept.
    pub fn invalidate(&mut self) {
        trace!("analysis cache invalidated");
        self.cfg = None;
        self.dominators = None;
        self.dominator_tree = None;
        self.dominance_frontier = None;
        self.reaching_definitions = None;
        self.liveness = None;
        self.loops = None;
    }

    /// Computes `kind` (and its prerequisites) if it is not stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn ensure(&mut self, function: &Function, kind: AnalysisKind) -> Result<()> {
        match kind {
            AnalysisKind::Cfg | AnalysisKind::Successors | AnalysisKind::Predecessors => {
                self.cfg(function).map(drop)
            }
            AnalysisKind::Dominators => self.dominators(function).map(drop),
            AnalysisKind::DominatorTree => self.dominator_tree(function).map(drop),
            AnalysisKind::DominanceFrontier => self.dominance_frontier(function).map(drop),
            AnalysisKind::ReachingDefinitions => self.reaching_definitions(function).map(drop),
            AnalysisKind::Liveness => self.liveness(function).map(drop),
            AnalysisKind::Loops => self.loops(function).map(drop),
        }
    }

    /// Returns the control flow graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn cfg(&mut self, function: &Function) -> Result<Rc<ControlFlowGraph>> {
        if let Some(cfg) = &self.cfg {
            return Ok(Rc::clone(cfg));
        }
        let cfg = Rc::new(ControlFlowGraph::build_with(function, &self.options)?);
        self.stats.record(AnalysisKind::Cfg);
        self.cfg = Some(Rc::clone(&cfg));
        Ok(cfg)
    }

    /// Returns the basic blocks in layout order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn blocks(&mut self, function: &Function) -> Result<Vec<BasicBlock>> {
        Ok(self.cfg(function)?.blocks().to_vec())
    }

    /// Returns the successor lists keyed by block name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn successors(&mut self, function: &Function) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.cfg(function)?.successor_map())
    }

    /// Returns the predecessor lists keyed by block name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn predecessors(&mut self, function: &Function) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.cfg(function)?.predecessor_map())
    }

    /// Returns the dominator sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn dominators(&mut self, function: &Function) -> Result<Rc<DominatorSets>> {
        if let Some(dominators) = &self.dominators {
            return Ok(Rc::clone(dominators));
        }
        let cfg = self.cfg(function)?;
        let dominators = Rc::new(compute_dominators(cfg.as_ref()));
        self.stats.record(AnalysisKind::Dominators);
        self.dominators = Some(Rc::clone(&dominators));
        Ok(dominators)
    }

    /// Returns the dominator tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn dominator_tree(&mut self, function: &Function) -> Result<Rc<DominatorTree>> {
        if let Some(tree) = &self.dominator_tree {
            return Ok(Rc::clone(tree));
        }
        let tree = Rc::new(self.dominators(function)?.tree());
        self.stats.record(AnalysisKind::DominatorTree);
        self.dominator_tree = Some(Rc::clone(&tree));
        Ok(tree)
    }

    /// Returns the dominance frontiers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn dominance_frontier(&mut self, function: &Function) -> Result<Rc<DominanceFrontier>> {
        if let Some(frontier) = &self.dominance_frontier {
            return Ok(Rc::clone(frontier));
        }
        let cfg = self.cfg(function)?;
        let frontier = Rc::new(self.dominators(function)?.frontier(cfg.as_ref()));
        self.stats.record(AnalysisKind::DominanceFrontier);
        self.dominance_frontier = Some(Rc::clone(&frontier));
        Ok(frontier)
    }

    /// Returns the reaching definitions; arguments are defined at entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn reaching_definitions(
        &mut self,
        function: &Function,
    ) -> Result<Rc<AnalysisResults<DefinitionMap>>> {
        if let Some(reaching) = &self.reaching_definitions {
            return Ok(Rc::clone(reaching));
        }
        let cfg = self.cfg(function)?;
        let reaching =
            Rc::new(DataFlowSolver::new(ReachingDefinitions::new(function)).solve(&cfg));
        self.stats.record(AnalysisKind::ReachingDefinitions);
        self.reaching_definitions = Some(Rc::clone(&reaching));
        Ok(reaching)
    }

    /// Returns the live variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn liveness(&mut self, function: &Function) -> Result<Rc<AnalysisResults<LiveSet>>> {
        if let Some(liveness) = &self.liveness {
            return Ok(Rc::clone(liveness));
        }
        let cfg = self.cfg(function)?;
        let liveness = Rc::new(DataFlowSolver::new(LiveVariables).solve(&cfg));
        self.stats.record(AnalysisKind::Liveness);
        self.liveness = Some(Rc::clone(&liveness));
        Ok(liveness)
    }

    /// Returns the natural loops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the CFG cannot be built.
    pub fn loops(&mut self, function: &Function) -> Result<Rc<LoopForest>> {
        if let Some(loops) = &self.loops {
            return Ok(Rc::clone(loops));
        }
        let cfg = self.cfg(function)?;
        let dominators = self.dominators(function)?;
        let loops = Rc::new(detect_loops(cfg.as_ref(), &dominators));
        self.stats.record(AnalysisKind::Loops);
        self.loops = Some(Rc::clone(&loops));
        Ok(loops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{diamond, linear};

    #[test]
    fn test_prerequisites_computed_once() {
        let function = diamond();
        let mut analysis = Analysis::new();

        analysis.dominance_frontier(&function).unwrap();
        analysis.dominator_tree(&function).unwrap();
        analysis.loops(&function).unwrap();
        analysis.successors(&function).unwrap();
        analysis.predecessors(&function).unwrap();

        let stats = analysis.stats();
        assert_eq!(stats.count(AnalysisKind::Cfg), 1);
        assert_eq!(stats.count(AnalysisKind::Dominators), 1);
        assert_eq!(stats.count(AnalysisKind::DominatorTree), 1);
        assert_eq!(stats.count(AnalysisKind::DominanceFrontier), 1);
        assert_eq!(stats.count(AnalysisKind::Loops), 1);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_returns_stored_value() {
        let function = diamond();
        let mut analysis = Analysis::new();
        let first = analysis.reaching_definitions(&function).unwrap();
        let second = analysis.reaching_definitions(&function).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(analysis.stats().count(AnalysisKind::ReachingDefinitions), 1);
    }

    #[test]
    fn test_invalidate_discards_everything() {
        let function = diamond();
        let mut analysis = Analysis::new();
        analysis.liveness(&function).unwrap();
        analysis.dominators(&function).unwrap();
        assert!(analysis.is_cached(AnalysisKind::Liveness));
        assert!(analysis.is_cached(AnalysisKind::Successors));

        analysis.invalidate();
        assert!(analysis.cached().is_empty());

        analysis.dominators(&function).unwrap();
        assert_eq!(analysis.stats().count(AnalysisKind::Cfg), 2);
        assert_eq!(analysis.stats().count(AnalysisKind::Dominators), 2);
    }

    #[test]
    fn test_no_automatic_invalidation() {
        let mut function = diamond();
        let mut analysis = Analysis::new();
        let before = analysis.cfg(&function).unwrap().block_count();

        function.instrs.truncate(1);
        let after = analysis.cfg(&function).unwrap().block_count();
        assert_eq!(before, after);
    }

    #[test]
    fn test_selector_names() {
        assert_eq!("dom".parse::<AnalysisKind>().unwrap(), AnalysisKind::Dominators);
        assert_eq!("dominators".parse::<AnalysisKind>().unwrap(), AnalysisKind::Dominators);
        assert_eq!("blocks".parse::<AnalysisKind>().unwrap(), AnalysisKind::Cfg);
        assert_eq!(
            "dominance_frontier".parse::<AnalysisKind>().unwrap(),
            AnalysisKind::DominanceFrontier
        );
        assert_eq!(AnalysisKind::ReachingDefinitions.to_string(), "reaching_definitions");
        assert!("bogus".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn test_ensure_by_kind() {
        let function = diamond();
        let mut analysis = Analysis::new();
        for kind in AnalysisKind::iter() {
            analysis.ensure(&function, kind).unwrap();
        }
        assert_eq!(analysis.cached().len(), AnalysisKind::iter().count());
    }

    #[test]
    fn test_liveness_on_linear_function() {
        let function = linear();
        let mut analysis = Analysis::new();
        let cfg = analysis.cfg(&function).unwrap();
        let liveness = analysis.liveness(&function).unwrap();
        let (inputs, _) = liveness.named(&cfg);

        assert!(inputs["entry"].is_empty());
        assert_eq!(inputs["b1"], LiveSet::from(["a".to_string()]));
        assert_eq!(inputs["b2"], LiveSet::from(["b".to_string()]));
    }
}
