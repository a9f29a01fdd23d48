//! Functions and programs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ir::{Instruction, Type};

/// A typed formal parameter of a [`Function`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// The parameter name.
    pub name: String,
    /// The parameter type.
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Argument {
    /// Creates a new argument.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A single function: a name, optional arguments and return type, and a flat instruction body.
///
/// Transforming passes replace [`instrs`](Self::instrs) wholesale; any analysis previously
/// computed for the function must then be invalidated by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// The function name.
    pub name: String,
    /// The formal parameters, if the function declares any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Argument>>,
    /// The return type, if the function returns a value.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    /// The body.
    #[serde(default)]
    pub instrs: Vec<Instruction>,
}

impl Function {
    /// Creates an empty function without arguments or return type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            ty: None,
            instrs: Vec::new(),
        }
    }

    /// Returns the argument names in declaration order.
    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .flatten()
            .map(|argument| argument.name.as_str())
    }

    /// Returns every variable named in the function: arguments, destinations and operands.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<String> {
        let mut variables: BTreeSet<String> = self.arg_names().map(str::to_string).collect();
        for instr in &self.instrs {
            if let Some(dest) = instr.dest() {
                variables.insert(dest.to_string());
            }
            variables.extend(instr.args().iter().cloned());
        }
        variables
    }

    /// Returns every label defined in the body, in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.instrs.iter().filter_map(Instruction::as_label)
    }
}

/// An ordered collection of functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The functions, in declaration order.
    pub functions: Vec<Function>,
}

impl Program {
    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}

/// Counts the `const` operations across every function of a program.
///
/// # Examples
///
/// ```rust
/// use tacopt::ir::{count_constants, FunctionBuilder, Program};
///
/// let main = FunctionBuilder::new("main")
///     .constant("a", 1)
///     .constant("b", 2)
///     .op("add", "c", &["a", "b"])
///     .build();
/// let program = Program { functions: vec![main] };
/// assert_eq!(count_constants(&program), 2);
/// ```
#[must_use]
pub fn count_constants(program: &Program) -> usize {
    program
        .functions
        .iter()
        .flat_map(|function| &function.instrs)
        .filter(|instr| instr.as_operation().is_some_and(|op| op.is_const()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_variables_include_arguments() {
        let function = FunctionBuilder::new("f")
            .arg("x", "int")
            .op("add", "y", &["x", "z"])
            .build();
        let variables = function.variables();
        assert!(variables.contains("x"));
        assert!(variables.contains("y"));
        assert!(variables.contains("z"));
        assert_eq!(variables.len(), 3);
    }

    #[test]
    fn test_program_lookup() {
        let program = Program {
            functions: vec![Function::new("main"), Function::new("helper")],
        };
        assert!(program.function("helper").is_some());
        assert!(program.function("missing").is_none());
    }
}
