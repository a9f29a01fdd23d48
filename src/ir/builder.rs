//! Fluent construction of function bodies.

use crate::ir::{Argument, Function, Instruction, Literal, Operation, Type};

/// Builder producing a [`Function`] one instruction at a time.
///
/// Value-producing operations get their result type inferred from the opcode: comparisons and
/// boolean logic produce `bool`, floating point arithmetic produces `float` and everything else
/// produces `int`. Use [`typed_op`](Self::typed_op) to override.
///
/// # Examples
///
/// ```rust
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("max")
///     .arg("a", "int")
///     .arg("b", "int")
///     .returns("int")
///     .op("gt", "cond", &["a", "b"])
///     .branch("cond", "left", "right")
///     .label("left")
///     .ret(Some("a"))
///     .label("right")
///     .ret(Some("b"))
///     .build();
///
/// assert_eq!(function.instrs.len(), 6);
/// ```
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    /// Starts a new function with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            function: Function::new(name),
        }
    }

    /// Appends a formal parameter.
    #[must_use]
    pub fn arg(mut self, name: &str, ty: &str) -> Self {
        self.function
            .args
            .get_or_insert_with(Vec::new)
            .push(Argument::new(name, Type::primitive(ty)));
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: &str) -> Self {
        self.function.ty = Some(Type::primitive(ty));
        self
    }

    /// Appends a label.
    #[must_use]
    pub fn label(self, name: &str) -> Self {
        self.instr(Instruction::label(name))
    }

    /// Appends an integer constant.
    #[must_use]
    pub fn constant(self, dest: &str, value: i64) -> Self {
        self.literal(dest, "int", Literal::Int(value))
    }

    /// Appends a boolean constant.
    #[must_use]
    pub fn constant_bool(self, dest: &str, value: bool) -> Self {
        self.literal(dest, "bool", Literal::Bool(value))
    }

    /// Appends a constant with an explicit type and literal.
    #[must_use]
    pub fn literal(self, dest: &str, ty: &str, value: Literal) -> Self {
        let mut op = Operation::new("const");
        op.dest = Some(dest.to_string());
        op.ty = Some(Type::primitive(ty));
        op.value = Some(value);
        self.instr(op.into())
    }

    /// Appends a value operation with an inferred result type.
    #[must_use]
    pub fn op(self, opcode: &str, dest: &str, args: &[&str]) -> Self {
        let ty = match opcode {
            "eq" | "lt" | "gt" | "le" | "ge" | "not" | "and" | "or" | "feq" | "flt" | "fgt"
            | "fle" | "fge" => "bool",
            "fadd" | "fsub" | "fmul" | "fdiv" => "float",
            _ => "int",
        };
        self.typed_op(opcode, dest, ty, args)
    }

    /// Appends a value operation with an explicit result type.
    #[must_use]
    pub fn typed_op(self, opcode: &str, dest: &str, ty: &str, args: &[&str]) -> Self {
        let mut op = Operation::new(opcode);
        op.dest = Some(dest.to_string());
        op.ty = Some(Type::primitive(ty));
        op.args = to_strings(args);
        self.instr(op.into())
    }

    /// Appends an operation without a destination, such as `print`.
    #[must_use]
    pub fn effect(self, opcode: &str, args: &[&str]) -> Self {
        let mut op = Operation::new(opcode);
        op.args = to_strings(args);
        self.instr(op.into())
    }

    /// Appends an unconditional jump.
    #[must_use]
    pub fn jump(self, target: &str) -> Self {
        let mut op = Operation::new("jmp");
        op.labels = vec![target.to_string()];
        self.instr(op.into())
    }

    /// Appends a conditional branch.
    #[must_use]
    pub fn branch(self, cond: &str, if_true: &str, if_false: &str) -> Self {
        let mut op = Operation::new("br");
        op.args = vec![cond.to_string()];
        op.labels = vec![if_true.to_string(), if_false.to_string()];
        self.instr(op.into())
    }

    /// Appends a return, optionally carrying a value.
    #[must_use]
    pub fn ret(self, value: Option<&str>) -> Self {
        let mut op = Operation::new("ret");
        op.args = value.into_iter().map(str::to_string).collect();
        self.instr(op.into())
    }

    /// Appends a phi with `(variable, predecessor label)` sources.
    #[must_use]
    pub fn phi(self, dest: &str, ty: &str, sources: &[(&str, &str)]) -> Self {
        let mut op = Operation::new("phi");
        op.dest = Some(dest.to_string());
        op.ty = Some(Type::primitive(ty));
        op.args = sources.iter().map(|(arg, _)| (*arg).to_string()).collect();
        op.labels = sources.iter().map(|(_, label)| (*label).to_string()).collect();
        self.instr(op.into())
    }

    /// Appends an arbitrary instruction.
    #[must_use]
    pub fn instr(mut self, instr: Instruction) -> Self {
        self.function.instrs.push(instr);
        self
    }

    /// Finishes the function.
    #[must_use]
    pub fn build(self) -> Function {
        self.function
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}
