//! Instruction representation for the three-address IR.
//!
//! An [`Instruction`] is either a [`Label`](Instruction::Label) marking a control flow target or
//! an [`Operation`] that computes, transfers control, or performs a side effect. The exchange
//! format carries both variants as a single flat record; [`RawInstruction`] models that record
//! and the conversion into [`Instruction`] is where malformed input is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unconditional jump opcode.
pub const OP_JMP: &str = "jmp";
/// Conditional branch opcode.
pub const OP_BR: &str = "br";
/// Return opcode.
pub const OP_RET: &str = "ret";
/// Constant-producing opcode.
pub const OP_CONST: &str = "const";
/// Phi pseudo-instruction opcode.
pub const OP_PHI: &str = "phi";
/// Copy opcode.
pub const OP_ID: &str = "id";

/// Operations without side effects whose result depends only on their operands.
///
/// These are the only operations loop-invariant code motion is allowed to move. Division is
/// deliberately absent: it can fault on a zero divisor.
const PURE_OPS: &[&str] = &[
    "const", "id", "add", "sub", "mul", "eq", "lt", "gt", "le", "ge", "not", "and", "or", "fadd",
    "fsub", "fmul", "fdiv", "feq", "flt", "fgt", "fle", "fge",
];

/// The type annotation attached to arguments and value-producing operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Type {
    /// A primitive type such as `int`, `bool` or `float`.
    Primitive(String),
    /// A pointer to values of the inner type.
    Pointer {
        /// The pointee type.
        ptr: Box<Type>,
    },
}

impl Type {
    /// Creates a primitive type from its name.
    #[must_use]
    pub fn primitive(name: impl Into<String>) -> Self {
        Type::Primitive(name.into())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(name) => f.write_str(name),
            Type::Pointer { ptr } => write!(f, "ptr<{ptr}>"),
        }
    }
}

/// A literal carried by a `const` operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// A boolean constant.
    Bool(bool),
    /// A 64-bit signed integer constant.
    Int(i64),
    /// A double precision floating point constant.
    Float(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value}"),
        }
    }
}

/// A non-label instruction.
///
/// Field names follow the exchange format: `type` is stored as [`ty`](Self::ty), and the list
/// fields are always present in memory (empty when absent in the input).
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The opcode, e.g. `add`, `br`, `const`.
    pub op: String,
    /// The variable written by this operation, if any.
    pub dest: Option<String>,
    /// The type of the written value, if any.
    pub ty: Option<Type>,
    /// Variable operands, in order.
    pub args: Vec<String>,
    /// The literal of a `const` operation.
    pub value: Option<Literal>,
    /// Label operands (jump targets, phi sources), in order.
    pub labels: Vec<String>,
    /// Function operands (call targets), in order.
    pub funcs: Vec<String>,
}

impl Operation {
    /// Creates an operation with the given opcode and no operands.
    #[must_use]
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            dest: None,
            ty: None,
            args: Vec::new(),
            value: None,
            labels: Vec::new(),
            funcs: Vec::new(),
        }
    }

    /// Returns `true` for `jmp`, `br` and `ret`, the operations that end a basic block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(self.op.as_str(), OP_JMP | OP_BR | OP_RET)
    }

    /// Returns `true` for operations that transfer control to labels (`jmp` and `br`).
    #[must_use]
    pub fn is_jump(&self) -> bool {
        matches!(self.op.as_str(), OP_JMP | OP_BR)
    }

    /// Returns `true` for `const`.
    #[must_use]
    pub fn is_const(&self) -> bool {
        self.op == OP_CONST
    }

    /// Returns `true` for `phi`.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        self.op == OP_PHI
    }

    /// Returns `true` if this operation has no side effects and may be moved freely.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.dest.is_some() && PURE_OPS.contains(&self.op.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = &self.dest {
            write!(f, "{dest}")?;
            if let Some(ty) = &self.ty {
                write!(f, ": {ty}")?;
            }
            write!(f, " = ")?;
        }
        write!(f, "{}", self.op)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        for func in &self.funcs {
            write!(f, " @{func}")?;
        }
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        for label in &self.labels {
            write!(f, " .{label}")?;
        }
        write!(f, ";")
    }
}

/// A single entry in a function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInstruction", into = "RawInstruction")]
pub enum Instruction {
    /// A control flow target marker. Labels have no runtime behavior.
    Label {
        /// The label name, without the leading `.`.
        name: String,
    },
    /// Any other instruction.
    Operation(Operation),
}

impl Instruction {
    /// Creates a label instruction.
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        Instruction::Label { name: name.into() }
    }

    /// Returns the label name if this is a label.
    #[must_use]
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Instruction::Label { name } => Some(name),
            Instruction::Operation(_) => None,
        }
    }

    /// Returns the operation if this is not a label.
    #[must_use]
    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Instruction::Label { .. } => None,
            Instruction::Operation(op) => Some(op),
        }
    }

    /// Returns the operation mutably if this is not a label.
    pub fn as_operation_mut(&mut self) -> Option<&mut Operation> {
        match self {
            Instruction::Label { .. } => None,
            Instruction::Operation(op) => Some(op),
        }
    }

    /// Returns the destination variable, if this instruction writes one.
    #[must_use]
    pub fn dest(&self) -> Option<&str> {
        self.as_operation().and_then(|op| op.dest.as_deref())
    }

    /// Returns the variable operands (empty for labels).
    #[must_use]
    pub fn args(&self) -> &[String] {
        match self {
            Instruction::Label { .. } => &[],
            Instruction::Operation(op) => &op.args,
        }
    }

    /// Returns `true` if this instruction ends a basic block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.as_operation().is_some_and(Operation::is_terminator)
    }
}

impl From<Operation> for Instruction {
    fn from(op: Operation) -> Self {
        Instruction::Operation(op)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label { name } => write!(f, ".{name}:"),
            Instruction::Operation(op) => write!(f, "  {op}"),
        }
    }
}

/// The flat record shape used by the exchange format.
///
/// Exactly one of `label` and `op` is expected to be present. Conversion into an
/// [`Instruction`] fails with [`Error::Malformed`] when both are missing; when both are present
/// the record is treated as an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInstruction {
    /// Label name for label records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Opcode for operation records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Destination variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Destination type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    /// Variable operands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Constant literal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
    /// Label operands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Function operands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funcs: Option<Vec<String>>,
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = Error;

    fn try_from(raw: RawInstruction) -> Result<Self> {
        if let Some(op) = raw.op {
            return Ok(Instruction::Operation(Operation {
                op,
                dest: raw.dest,
                ty: raw.ty,
                args: raw.args.unwrap_or_default(),
                value: raw.value,
                labels: raw.labels.unwrap_or_default(),
                funcs: raw.funcs.unwrap_or_default(),
            }));
        }

        match raw.label {
            Some(name) => Ok(Instruction::Label { name }),
            None => Err(malformed_error!(
                "instruction has neither an op nor a label: {:?}",
                raw
            )),
        }
    }
}

impl From<Instruction> for RawInstruction {
    fn from(instr: Instruction) -> Self {
        match instr {
            Instruction::Label { name } => RawInstruction {
                label: Some(name),
                ..RawInstruction::default()
            },
            Instruction::Operation(op) => {
                let non_empty = |list: Vec<String>| (!list.is_empty()).then_some(list);
                RawInstruction {
                    label: None,
                    op: Some(op.op),
                    dest: op.dest,
                    ty: op.ty,
                    args: non_empty(op.args),
                    value: op.value,
                    labels: non_empty(op.labels),
                    funcs: non_empty(op.funcs),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_label_converts() {
        let raw = RawInstruction {
            label: Some("loop".to_string()),
            ..RawInstruction::default()
        };
        let instr = Instruction::try_from(raw).unwrap();
        assert_eq!(instr.as_label(), Some("loop"));
        assert!(!instr.is_terminator());
    }

    #[test]
    fn test_raw_without_op_or_label_is_malformed() {
        let raw = RawInstruction {
            dest: Some("x".to_string()),
            ..RawInstruction::default()
        };
        let err = Instruction::try_from(raw).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn test_terminator_classification() {
        assert!(Operation::new("jmp").is_terminator());
        assert!(Operation::new("br").is_terminator());
        assert!(Operation::new("ret").is_terminator());
        assert!(!Operation::new("print").is_terminator());
        assert!(Operation::new("br").is_jump());
        assert!(!Operation::new("ret").is_jump());
    }

    #[test]
    fn test_purity_requires_destination() {
        let mut add = Operation::new("add");
        assert!(!add.is_pure());
        add.dest = Some("x".to_string());
        assert!(add.is_pure());

        let mut div = Operation::new("div");
        div.dest = Some("q".to_string());
        assert!(!div.is_pure());

        let mut call = Operation::new("call");
        call.dest = Some("r".to_string());
        assert!(!call.is_pure());
    }

    #[test]
    fn test_operation_display() {
        let mut op = Operation::new("add");
        op.dest = Some("sum".to_string());
        op.ty = Some(Type::primitive("int"));
        op.args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(op.to_string(), "sum: int = add a b;");

        let mut br = Operation::new("br");
        br.args = vec!["cond".to_string()];
        br.labels = vec!["then".to_string(), "else".to_string()];
        assert_eq!(br.to_string(), "br cond .then .else;");
    }

    #[test]
    fn test_raw_roundtrip_drops_empty_lists() {
        let mut op = Operation::new("ret");
        op.args = Vec::new();
        let raw = RawInstruction::from(Instruction::Operation(op));
        assert_eq!(raw.op.as_deref(), Some("ret"));
        assert!(raw.args.is_none());
        assert!(raw.labels.is_none());
    }
}
