//! Leaving SSA form, and checking that a function is in it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    analysis::ControlFlowGraph,
    ir::{Function, Instruction, Operation, OP_ID},
    utils::graph::NodeId,
    Error, Result,
};

/// Replaces every phi by copies at the end of its predecessors.
///
/// `v = phi a .l1 b .l2` becomes `v = id a` at the end of block `l1` and `v = id b` at the end
/// of block `l2`, placed before the block's terminator if it has one. The phi itself is removed.
/// Copies are inserted in phi order, so the result is correct for the conventional SSA produced
/// by [`convert_to_ssa`](super::convert_to_ssa), where the versions of one variable never
/// overlap. SSA that has been copy-propagated may need a parallel-copy sequentialisation first.
///
/// # Returns
///
/// The number of phis removed.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if a phi names a label that no block carries or its argument and
/// label lists differ in length.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::ssa::convert_from_ssa;
/// use tacopt::ir::FunctionBuilder;
///
/// let mut function = FunctionBuilder::new("f")
///     .label("a")
///     .constant("x.0", 1)
///     .jump("b")
///     .label("b")
///     .phi("x.1", "int", &[("x.0", "a")])
///     .ret(Some("x.1"))
///     .build();
///
/// assert_eq!(convert_from_ssa(&mut function)?, 1);
/// assert_eq!(function.instrs[2].to_string(), "  x.1: int = id x.0;");
/// # Ok::<(), tacopt::Error>(())
/// ```
pub fn convert_from_ssa(function: &mut Function) -> Result<usize> {
    let cfg = ControlFlowGraph::build(function)?;
    let mut blocks: Vec<Vec<Instruction>> =
        cfg.blocks().iter().map(|block| block.instrs.clone()).collect();

    let by_label: HashMap<&str, usize> = cfg
        .blocks()
        .iter()
        .enumerate()
        .filter_map(|(index, block)| block.label.as_deref().map(|label| (label, index)))
        .collect();

    let mut copies: Vec<Vec<Operation>> = vec![Vec::new(); blocks.len()];
    let mut removed = 0;

    for block in &mut blocks {
        let mut kept = Vec::with_capacity(block.len());
        for instr in block.drain(..) {
            let phi = match instr {
                Instruction::Operation(op) if op.is_phi() => op,
                other => {
                    kept.push(other);
                    continue;
                }
            };
            if phi.args.len() != phi.labels.len() {
                return Err(malformed_error!(
                    "phi '{}' has {} arguments but {} labels",
                    phi,
                    phi.args.len(),
                    phi.labels.len()
                ));
            }
            for (arg, label) in phi.args.iter().zip(&phi.labels) {
                let Some(&source) = by_label.get(label.as_str()) else {
                    return Err(malformed_error!(
                        "phi '{}' names unknown predecessor '{}'",
                        phi,
                        label
                    ));
                };
                let mut copy = Operation::new(OP_ID);
                copy.dest = phi.dest.clone();
                copy.ty = phi.ty.clone();
                copy.args = vec![arg.clone()];
                copies[source].push(copy);
            }
            removed += 1;
        }
        *block = kept;
    }

    for (block, block_copies) in blocks.iter_mut().zip(copies) {
        if block_copies.is_empty() {
            continue;
        }
        let at = if block.last().is_some_and(Instruction::is_terminator) {
            block.len() - 1
        } else {
            block.len()
        };
        block.splice(at..at, block_copies.into_iter().map(Instruction::from));
    }

    function.instrs = blocks.into_iter().flatten().collect();
    debug!(function = function.name.as_str(), phis = removed, "converted out of SSA");
    Ok(removed)
}

/// Checks that every variable of a function is assigned at most once.
///
/// Arguments count as assignments. Phis must carry as many arguments as labels, every label
/// must name a distinct reachable predecessor of the phi's block, and a phi in a block with
/// reachable predecessors needs at least one incoming value. A phi may leave out a predecessor
/// along which its variable is undefined.
///
/// # Errors
///
/// - [`Error::NotInSsa`] naming the first offending variable or phi
/// - [`Error::Malformed`] if the function has phis and a bad jump target
pub fn verify_ssa(function: &Function) -> Result<()> {
    let mut assigned: HashSet<&str> = HashSet::new();
    for arg in function.arg_names() {
        if !assigned.insert(arg) {
            return Err(Error::NotInSsa(format!(
                "argument '{arg}' of '{}' is declared twice",
                function.name
            )));
        }
    }

    for op in function.instrs.iter().filter_map(Instruction::as_operation) {
        if op.is_phi() && op.args.len() != op.labels.len() {
            return Err(Error::NotInSsa(format!(
                "phi '{op}' has {} arguments but {} labels",
                op.args.len(),
                op.labels.len()
            )));
        }
        if let Some(dest) = op.dest.as_deref() {
            if !assigned.insert(dest) {
                return Err(Error::NotInSsa(format!(
                    "'{dest}' is assigned more than once in '{}'",
                    function.name
                )));
            }
        }
    }

    let has_phis = function
        .instrs
        .iter()
        .filter_map(Instruction::as_operation)
        .any(Operation::is_phi);
    if has_phis {
        verify_phi_edges(function)?;
    }
    Ok(())
}

/// Checks every phi of a reachable block against the block's incoming edges.
fn verify_phi_edges(function: &Function) -> Result<()> {
    let cfg = ControlFlowGraph::build(function)?;
    let reachable = cfg.reachable();

    for &node in &reachable {
        let Some(block) = cfg.block(node) else {
            continue;
        };
        let preds: Vec<NodeId> = cfg
            .predecessors(node)
            .iter()
            .copied()
            .filter(|pred| reachable.contains(pred))
            .collect();
        let incoming: HashSet<&str> = preds
            .iter()
            .filter_map(|&pred| cfg.block(pred).and_then(|pred| pred.label.as_deref()))
            .collect();

        for op in block.operations().filter(|op| op.is_phi()) {
            if op.args.is_empty() && !preds.is_empty() {
                return Err(Error::NotInSsa(format!(
                    "phi '{op}' in block '{}' has no incoming values",
                    block.source_label()
                )));
            }
            let mut seen = HashSet::new();
            for label in &op.labels {
                if !incoming.contains(label.as_str()) {
                    return Err(Error::NotInSsa(format!(
                        "phi '{op}' names '{label}', which is not a predecessor of '{}'",
                        block.source_label()
                    )));
                }
                if !seen.insert(label.as_str()) {
                    return Err(Error::NotInSsa(format!(
                        "phi '{op}' names predecessor '{label}' twice"
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{ssa::convert_to_ssa, Analysis},
        emulation::Interpreter,
        ir::FunctionBuilder,
        test::{diamond, self_loop},
    };

    #[test]
    fn test_verify_rejects_reassignment() {
        let function = FunctionBuilder::new("f")
            .constant("x", 1)
            .constant("x", 2)
            .build();
        assert!(matches!(verify_ssa(&function), Err(Error::NotInSsa(_))));
    }

    #[test]
    fn test_verify_rejects_argument_redefinition() {
        let function = FunctionBuilder::new("f")
            .arg("a", "int")
            .constant("a", 2)
            .build();
        assert!(verify_ssa(&function).is_err());
    }

    fn join_with_phi(sources: &[(&str, &str)]) -> Function {
        FunctionBuilder::new("f")
            .constant_bool("c", true)
            .branch("c", "left", "right")
            .label("left")
            .constant("x.0", 1)
            .jump("join")
            .label("right")
            .constant("x.1", 2)
            .jump("join")
            .label("join")
            .phi("x.2", "int", sources)
            .ret(Some("x.2"))
            .build()
    }

    #[test]
    fn test_verify_accepts_phi_over_predecessors() {
        let function = join_with_phi(&[("x.0", "left"), ("x.1", "right")]);
        verify_ssa(&function).unwrap();
    }

    #[test]
    fn test_verify_rejects_phi_without_values() {
        let function = join_with_phi(&[]);
        let err = verify_ssa(&function).unwrap_err();
        assert!(matches!(err, Error::NotInSsa(ref message) if message.contains("no incoming")));
    }

    #[test]
    fn test_verify_rejects_phi_naming_non_predecessor() {
        let function = join_with_phi(&[("x.0", "left"), ("x.1", "f.right")]);
        let err = verify_ssa(&function).unwrap_err();
        assert!(matches!(err, Error::NotInSsa(ref message) if message.contains("f.right")));
    }

    #[test]
    fn test_verify_rejects_repeated_predecessor() {
        let function = join_with_phi(&[("x.0", "left"), ("x.1", "left")]);
        assert!(matches!(verify_ssa(&function), Err(Error::NotInSsa(_))));
    }

    #[test]
    fn test_copies_go_before_terminator() {
        let mut function = diamond();
        convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        assert_eq!(convert_from_ssa(&mut function).unwrap(), 1);
        assert!(function
            .instrs
            .iter()
            .filter_map(Instruction::as_operation)
            .all(|op| !op.is_phi()));

        let rendered: Vec<String> = function.instrs.iter().map(ToString::to_string).collect();
        let left = rendered.iter().position(|line| line == ".left:").unwrap();
        assert_eq!(rendered[left + 2], "  x.2: int = id x.0;");
        assert_eq!(rendered[left + 3], "  jmp .join;");
    }

    #[test]
    fn test_unknown_predecessor_is_malformed() {
        let mut function = FunctionBuilder::new("f")
            .label("a")
            .phi("x", "int", &[("y", "nowhere")])
            .ret(None)
            .build();
        assert!(matches!(
            convert_from_ssa(&mut function),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_round_trip_preserves_behavior() {
        let original = self_loop();
        let mut function = original.clone();
        convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
        convert_from_ssa(&mut function).unwrap();

        let before = Interpreter::new().run(&original, &[]).unwrap();
        let after = Interpreter::new().run(&function, &[]).unwrap();
        assert_eq!(before.output, after.output);
        assert_eq!(before.return_value, after.return_value);
    }
}
