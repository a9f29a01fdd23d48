//! Basic blocks and instruction-list splitting.

use crate::ir::{Instruction, Operation};

/// A maximal straight-line sequence of instructions with one entry and one exit.
///
/// The block keeps its leading label instruction (if any) as the first entry of
/// [`instrs`](Self::instrs). A terminator (`jmp`, `br`, `ret`), if present, is always the last
/// instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// The block name, unique within its function.
    pub name: String,
    /// The label the block starts with in the source, if any.
    pub label: Option<String>,
    /// The instructions, including the leading label.
    pub instrs: Vec<Instruction>,
}

impl BasicBlock {
    /// Returns the terminating operation, if the block ends with one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Operation> {
        self.instrs
            .last()
            .and_then(Instruction::as_operation)
            .filter(|op| op.is_terminator())
    }

    /// Returns the terminating operation mutably.
    pub fn terminator_mut(&mut self) -> Option<&mut Operation> {
        self.instrs
            .last_mut()
            .and_then(Instruction::as_operation_mut)
            .filter(|op| op.is_terminator())
    }

    /// Returns the label a `jmp`, `br` or `phi` refers to this block by.
    ///
    /// This is the source label when there is one. The block name is the fallback, and it is
    /// qualified when the graph was built with qualified names.
    #[must_use]
    pub fn source_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns the non-label instructions in order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.instrs.iter().filter_map(Instruction::as_operation)
    }

    /// Returns `true` if the block contains nothing but (at most) its label.
    #[must_use]
    pub fn is_label_only(&self) -> bool {
        self.operations().next().is_none()
    }

    /// Returns the variables written in this block, in order, with repeats.
    pub fn definitions(&self) -> impl Iterator<Item = &str> {
        self.operations().filter_map(|op| op.dest.as_deref())
    }
}

/// Splits an instruction list into the instruction sequences of its basic blocks.
///
/// A label closes the open block (if it is non-empty) and starts a new one beginning with the
/// label. A terminator is appended to the open block and closes it. Any other operation is
/// appended. The end of the input closes the open block.
///
/// # Examples
///
/// ```rust
/// use tacopt::analysis::cfg::split_blocks;
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("f")
///     .constant("a", 1)
///     .jump("next")
///     .label("next")
///     .ret(Some("a"))
///     .build();
///
/// let blocks = split_blocks(&function.instrs);
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].len(), 2);
/// assert_eq!(blocks[1].len(), 2);
/// ```
#[must_use]
pub fn split_blocks(instrs: &[Instruction]) -> Vec<Vec<Instruction>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();

    for instr in instrs {
        match instr {
            Instruction::Label { .. } => {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                current.push(instr.clone());
            }
            Instruction::Operation(op) => {
                current.push(instr.clone());
                if op.is_terminator() {
                    blocks.push(std::mem::take(&mut current));
                }
            }
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_split_on_terminators() {
        let function = FunctionBuilder::new("f")
            .constant("a", 1)
            .ret(None)
            .constant("dead", 2)
            .build();
        let blocks = split_blocks(&function.instrs);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].len(), 2);
        assert_eq!(blocks[1].len(), 1);
    }

    #[test]
    fn test_consecutive_labels_make_label_only_block() {
        let function = FunctionBuilder::new("f")
            .label("a")
            .label("b")
            .ret(None)
            .build();
        let blocks = split_blocks(&function.instrs);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], vec![Instruction::label("a")]);
    }

    #[test]
    fn test_label_after_terminator_does_not_create_empty_block() {
        let function = FunctionBuilder::new("f")
            .jump("a")
            .label("a")
            .ret(None)
            .build();
        let blocks = split_blocks(&function.instrs);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_blocks(&[]).is_empty());
    }

    #[test]
    fn test_block_accessors() {
        let function = FunctionBuilder::new("f")
            .label("top")
            .constant("x", 1)
            .op("add", "y", &["x", "x"])
            .jump("top")
            .build();
        let block = BasicBlock {
            name: "top".to_string(),
            label: Some("top".to_string()),
            instrs: function.instrs,
        };
        assert_eq!(block.terminator().map(|op| op.op.as_str()), Some("jmp"));
        assert_eq!(block.definitions().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(!block.is_label_only());
    }
}
