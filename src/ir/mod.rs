//! The three-address intermediate representation.
//!
//! A [`Program`] is an ordered list of [`Function`]s. Each function body is a flat list of
//! [`Instruction`]s: labels marking control flow targets and operations computing values,
//! transferring control or performing side effects. Types and field names follow the JSON
//! exchange format, so programs can be read and written with any serde format.
//!
//! # Key Components
//!
//! - [`Instruction`] / [`Operation`] - Instruction representation
//! - [`RawInstruction`] - The flat record shape used on the wire
//! - [`Function`] / [`Program`] - Containers
//! - [`FunctionBuilder`] - Fluent construction of function bodies

mod builder;
mod function;
mod instruction;

pub use builder::FunctionBuilder;
pub use function::{count_constants, Argument, Function, Program};
pub use instruction::{
    Instruction, Literal, Operation, RawInstruction, Type, OP_BR, OP_CONST, OP_ID, OP_JMP,
    OP_PHI, OP_RET,
};
