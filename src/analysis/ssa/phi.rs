//! Phi node placement.
//!
//! A phi is needed at a block when two or more different definitions of a variable can reach
//! it along different incoming edges. Placement here is driven by reaching definitions: at
//! every block with at least two predecessors, each variable whose incoming reaching
//! definitions come from more than one distinct block receives a phi with one slot per
//! predecessor.

use std::collections::BTreeMap;

use crate::{
    analysis::{
        dataflow::{AnalysisResults, DefinitionMap},
        ControlFlowGraph,
    },
    ir::{Operation, Type, OP_PHI},
    utils::graph::NodeId,
};

/// One incoming value of a phi, keyed by the predecessor it flows in from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiSlot {
    /// Source label of the predecessor block.
    pub predecessor: String,
    /// The SSA name flowing in along that edge, once renaming has filled it.
    pub value: Option<String>,
}

/// A phi node under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    /// The original (pre-SSA) variable merged by this phi.
    pub variable: String,
    /// The fresh SSA name defined by this phi, once renaming has assigned it.
    pub dest: Option<String>,
    /// One slot per predecessor, in predecessor order.
    pub slots: Vec<PhiSlot>,
}

impl PhiNode {
    /// Creates a phi for `variable` with an empty slot for every predecessor.
    #[must_use]
    pub fn new(variable: impl Into<String>, predecessors: &[String]) -> Self {
        Self {
            variable: variable.into(),
            dest: None,
            slots: predecessors
                .iter()
                .map(|pred| PhiSlot {
                    predecessor: pred.clone(),
                    value: None,
                })
                .collect(),
        }
    }

    /// Fills the slot of `predecessor` with `value`. Returns `false` if there is no such slot.
    pub fn fill(&mut self, predecessor: &str, value: &str) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|slot| slot.predecessor == predecessor)
        {
            Some(slot) => {
                slot.value = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    /// Converts the phi into a `phi` operation; unfilled slots are dropped.
    #[must_use]
    pub fn to_operation(&self, ty: Option<Type>) -> Operation {
        let mut op = Operation::new(OP_PHI);
        op.dest = Some(self.dest.clone().unwrap_or_else(|| self.variable.clone()));
        op.ty = ty;
        for slot in &self.slots {
            if let Some(value) = &slot.value {
                op.args.push(value.clone());
                op.labels.push(slot.predecessor.clone());
            }
        }
        op
    }
}

/// Computes the phis of every block, indexed by block id.
///
/// Variables are visited in name order, so the phis of a block are sorted by variable.
#[must_use]
pub fn place_phis(
    cfg: &ControlFlowGraph,
    reaching: &AnalysisResults<DefinitionMap>,
) -> Vec<Vec<PhiNode>> {
    let mut phis = vec![Vec::new(); cfg.block_count()];

    for (index, block_phis) in phis.iter_mut().enumerate() {
        let node = NodeId::new(index);
        let preds = cfg.predecessors(node);
        if preds.len() < 2 {
            continue;
        }
        let Some(incoming) = reaching.in_state(node) else {
            continue;
        };

        // Slots carry source labels, independent of how the graph names its blocks
        let pred_labels: Vec<String> = preds
            .iter()
            .map(|&pred| cfg.blocks()[pred.index()].source_label().to_string())
            .collect();
        for (variable, def_blocks) in incoming {
            if def_blocks.len() > 1 {
                block_phis.push(PhiNode::new(variable.clone(), &pred_labels));
            }
        }
    }

    phis
}

/// Returns the number of phis placed per variable. Used for diagnostics.
#[must_use]
pub fn phi_counts(phis: &[Vec<PhiNode>]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for phi in phis.iter().flatten() {
        *counts.entry(phi.variable.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            cfg::CfgOptions,
            dataflow::{run_dataflow, ReachingDefinitions},
        },
        ir::FunctionBuilder,
        test::diamond,
    };

    #[test]
    fn test_phi_at_diamond_join() {
        let function = FunctionBuilder::new("f")
            .constant_bool("c", true)
            .branch("c", "left", "right")
            .label("left")
            .constant("x", 1)
            .jump("join")
            .label("right")
            .constant("x", 2)
            .jump("join")
            .label("join")
            .ret(Some("x"))
            .build();
        let cfg = ControlFlowGraph::build(&function).unwrap();
        let reaching = run_dataflow(&function, ReachingDefinitions::new(&function)).unwrap();
        let phis = place_phis(&cfg, &reaching);

        let join = cfg.id("join").unwrap();
        assert_eq!(phis[join.index()].len(), 1);
        let phi = &phis[join.index()][0];
        assert_eq!(phi.variable, "x");
        let preds: Vec<&str> = phi.slots.iter().map(|s| s.predecessor.as_str()).collect();
        assert_eq!(preds, vec!["left", "right"]);
        assert_eq!(phi_counts(&phis)["x"], 1);
    }

    #[test]
    fn test_slots_use_source_labels_when_names_are_qualified() {
        let function = diamond();
        let options = CfgOptions {
            qualify_names: true,
        };
        let cfg = ControlFlowGraph::build_with(&function, &options).unwrap();
        let reaching = run_dataflow(&function, ReachingDefinitions::new(&function)).unwrap();
        let phis = place_phis(&cfg, &reaching);

        let join = cfg.id("diamond.join").unwrap();
        let preds: Vec<&str> = phis[join.index()][0]
            .slots
            .iter()
            .map(|s| s.predecessor.as_str())
            .collect();
        assert_eq!(preds, vec!["left", "right"]);
    }

    #[test]
    fn test_fill_and_materialize_drops_empty_slots() {
        let mut phi = PhiNode::new("x", &["a".to_string(), "b".to_string()]);
        phi.dest = Some("x.2".to_string());
        assert!(phi.fill("a", "x.0"));
        assert!(!phi.fill("zzz", "x.1"));

        let op = phi.to_operation(Some(Type::primitive("int")));
        assert_eq!(op.dest.as_deref(), Some("x.2"));
        assert_eq!(op.args, vec!["x.0".to_string()]);
        assert_eq!(op.labels, vec!["a".to_string()]);
    }
}
