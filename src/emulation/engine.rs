//! The instruction-list interpreter.
//!
//! The [`Interpreter`] executes a single [`Function`] directly from its flat instruction list.
//! Labels are executed too: each one records the label it replaces as the "previous block",
//! which is what `phi` selects its operand by.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::{
    emulation::Value,
    ir::{Function, Instruction, Operation},
    Error, Result,
};

/// The default instruction budget.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// The observable outcome of running a function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Execution {
    /// One line per executed `print`, operands separated by spaces.
    pub output: Vec<String>,
    /// Final variable bindings.
    pub env: BTreeMap<String, Value>,
    /// The value passed to `ret`, if any.
    pub return_value: Option<Value>,
    /// Number of operations executed (labels are not counted).
    pub steps: u64,
}

/// What the dispatch loop does after an operation.
enum StepResult {
    /// Go on with the next instruction in layout order.
    Continue,
    /// Transfer control to a label.
    Branch(String),
    /// Leave the function.
    Return(Option<Value>),
}

/// Reference interpreter for functions.
///
/// Supports `const`, `id`, integer arithmetic (wrapping) and comparisons, float arithmetic and
/// comparisons, boolean logic, `print`, `nop`, `jmp`, `br`, `ret` and `phi`. Anything else is
/// [`Error::NotSupported`].
///
/// # Examples
///
/// ```rust
/// use tacopt::emulation::{Interpreter, Value};
/// use tacopt::ir::FunctionBuilder;
///
/// let function = FunctionBuilder::new("double")
///     .arg("n", "int")
///     .returns("int")
///     .op("add", "twice", &["n", "n"])
///     .effect("print", &["twice"])
///     .ret(Some("twice"))
///     .build();
///
/// let execution = Interpreter::new().run(&function, &[Value::Int(21)])?;
/// assert_eq!(execution.output, vec!["42".to_string()]);
/// assert_eq!(execution.return_value, Some(Value::Int(42)));
/// # Ok::<(), tacopt::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Interpreter {
    step_limit: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter with the default step limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_step_limit(DEFAULT_STEP_LIMIT)
    }

    /// Creates an interpreter that stops after `step_limit` operations.
    #[must_use]
    pub fn with_step_limit(step_limit: u64) -> Self {
        Self { step_limit }
    }

    /// Returns the step limit.
    #[must_use]
    pub fn step_limit(&self) -> u64 {
        self.step_limit
    }

    /// Runs `function` with the given argument values.
    ///
    /// # Errors
    ///
    /// - [`Error::Emulation`] on a wrong argument count, a read of an unset variable, an operand
    ///   of the wrong type, a division by zero or a jump to a missing label
    /// - [`Error::StepLimit`] when the budget is exhausted
    /// - [`Error::NotSupported`] for operations outside the supported set
    pub fn run(&self, function: &Function, args: &[Value]) -> Result<Execution> {
        let params: Vec<&str> = function.arg_names().collect();
        if params.len() != args.len() {
            return Err(Error::Emulation(format!(
                "function '{}' expects {} argument(s), got {}",
                function.name,
                params.len(),
                args.len()
            )));
        }

        let labels: HashMap<&str, usize> = function
            .instrs
            .iter()
            .enumerate()
            .filter_map(|(index, instr)| instr.as_label().map(|label| (label, index)))
            .collect();

        let mut state = Execution {
            env: params
                .iter()
                .zip(args)
                .map(|(name, value)| ((*name).to_string(), *value))
                .collect(),
            ..Execution::default()
        };
        let mut current: Option<&str> = None;
        let mut previous: Option<&str> = None;
        let mut pc = 0;

        while let Some(instr) = function.instrs.get(pc) {
            let op = match instr {
                Instruction::Label { name } => {
                    previous = current;
                    current = Some(name.as_str());
                    pc += 1;
                    continue;
                }
                Instruction::Operation(op) => op,
            };

            state.steps += 1;
            if state.steps > self.step_limit {
                return Err(Error::StepLimit(self.step_limit));
            }

            match self.execute(op, &mut state, previous)? {
                StepResult::Continue => pc += 1,
                StepResult::Branch(target) => {
                    pc = *labels.get(target.as_str()).ok_or_else(|| {
                        Error::Emulation(format!("jump to unknown label '{target}'"))
                    })?;
                }
                StepResult::Return(value) => {
                    state.return_value = value;
                    break;
                }
            }
        }

        trace!(
            function = function.name.as_str(),
            steps = state.steps,
            "emulation finished"
        );
        Ok(state)
    }

    fn execute(
        &self,
        op: &Operation,
        state: &mut Execution,
        previous: Option<&str>,
    ) -> Result<StepResult> {
        let env = &mut state.env;
        let result = match op.op.as_str() {
            "nop" => return Ok(StepResult::Continue),
            "print" => {
                let line = op
                    .args
                    .iter()
                    .map(|arg| read(env, arg).map(|value| value.to_string()))
                    .collect::<Result<Vec<_>>>()?
                    .join(" ");
                state.output.push(line);
                return Ok(StepResult::Continue);
            }
            "jmp" => return Ok(StepResult::Branch(label(op, 0)?.to_string())),
            "br" => {
                let taken = if bool_arg(env, op, 0)? { 0 } else { 1 };
                return Ok(StepResult::Branch(label(op, taken)?.to_string()));
            }
            "ret" => {
                let value = match op.args.first() {
                    Some(arg) => Some(read(env, arg)?),
                    None => None,
                };
                return Ok(StepResult::Return(value));
            }
            "phi" => {
                let source = previous.and_then(|previous| {
                    op.labels
                        .iter()
                        .position(|label| label == previous)
                        .and_then(|index| op.args.get(index))
                });
                match source {
                    Some(arg) => Some(read(env, arg)?),
                    None => None,
                }
            }
            "const" => Some(
                op.value
                    .map(Value::from)
                    .ok_or_else(|| Error::Emulation("const without a value".to_string()))?,
            ),
            "id" => Some(arg(env, op, 0)?),
            "add" | "sub" | "mul" | "div" => {
                let (a, b) = (int_arg(env, op, 0)?, int_arg(env, op, 1)?);
                Some(Value::Int(match op.op.as_str() {
                    "add" => a.wrapping_add(b),
                    "sub" => a.wrapping_sub(b),
                    "mul" => a.wrapping_mul(b),
                    _ if b == 0 => return Err(Error::Emulation("division by zero".to_string())),
                    _ => a.wrapping_div(b),
                }))
            }
            "eq" | "lt" | "gt" | "le" | "ge" => {
                let (a, b) = (int_arg(env, op, 0)?, int_arg(env, op, 1)?);
                Some(Value::Bool(match op.op.as_str() {
                    "eq" => a == b,
                    "lt" => a < b,
                    "gt" => a > b,
                    "le" => a <= b,
                    _ => a >= b,
                }))
            }
            "not" => Some(Value::Bool(!bool_arg(env, op, 0)?)),
            "and" | "or" => {
                let (a, b) = (bool_arg(env, op, 0)?, bool_arg(env, op, 1)?);
                Some(Value::Bool(if op.op == "and" { a && b } else { a || b }))
            }
            "fadd" | "fsub" | "fmul" | "fdiv" => {
                let (a, b) = (float_arg(env, op, 0)?, float_arg(env, op, 1)?);
                Some(Value::Float(match op.op.as_str() {
                    "fadd" => a + b,
                    "fsub" => a - b,
                    "fmul" => a * b,
                    _ => a / b,
                }))
            }
            "feq" | "flt" | "fgt" | "fle" | "fge" => {
                let (a, b) = (float_arg(env, op, 0)?, float_arg(env, op, 1)?);
                Some(Value::Bool(match op.op.as_str() {
                    "feq" => a == b,
                    "flt" => a < b,
                    "fgt" => a > b,
                    "fle" => a <= b,
                    _ => a >= b,
                }))
            }
            _ => return Err(Error::NotSupported),
        };

        if let Some(dest) = &op.dest {
            match result {
                Some(value) => {
                    env.insert(dest.clone(), value);
                }
                // A phi without a source for the incoming edge leaves its destination unset.
                None => {
                    env.remove(dest);
                }
            }
        }
        Ok(StepResult::Continue)
    }
}

fn read(env: &BTreeMap<String, Value>, name: &str) -> Result<Value> {
    env.get(name)
        .copied()
        .ok_or_else(|| Error::Emulation(format!("undefined variable '{name}'")))
}

fn arg(env: &BTreeMap<String, Value>, op: &Operation, index: usize) -> Result<Value> {
    let name = op.args.get(index).ok_or_else(|| {
        Error::Emulation(format!("'{}' is missing operand {index}", op.op))
    })?;
    read(env, name)
}

fn label(op: &Operation, index: usize) -> Result<&str> {
    op.labels
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::Emulation(format!("'{}' is missing label {index}", op.op)))
}

fn mismatch(op: &Operation, expected: &str, found: Value) -> Error {
    Error::Emulation(format!(
        "'{}' expected {expected}, found {}",
        op.op,
        found.type_name()
    ))
}

fn int_arg(env: &BTreeMap<String, Value>, op: &Operation, index: usize) -> Result<i64> {
    let value = arg(env, op, index)?;
    value.as_int().ok_or_else(|| mismatch(op, "int", value))
}

fn bool_arg(env: &BTreeMap<String, Value>, op: &Operation, index: usize) -> Result<bool> {
    let value = arg(env, op, index)?;
    value.as_bool().ok_or_else(|| mismatch(op, "bool", value))
}

fn float_arg(env: &BTreeMap<String, Value>, op: &Operation, index: usize) -> Result<f64> {
    let value = arg(env, op, index)?;
    value.as_float().ok_or_else(|| mismatch(op, "float", value))
}
