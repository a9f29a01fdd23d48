use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every pass in this crate is an offline, deterministic batch transformation. None of these
/// errors is retried or degraded: an error aborts processing of the function it was raised for.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - An instruction record that is neither a label nor an operation, or a
///   jump to a label that does not exist
/// - [`Error::UnknownSelector`] - A pass or analysis name that the pipeline does not know
///
/// ## SSA Construction Errors
/// - [`Error::UndefinedVariable`] - A use with no reaching definition during renaming
/// - [`Error::SsaStackMismatch`] - Renaming stacks out of balance after visiting a block
/// - [`Error::NotInSsa`] - A function failed SSA verification
///
/// ## Emulation Errors
/// - [`Error::Emulation`] - The reference interpreter hit a runtime fault
/// - [`Error::StepLimit`] - The interpreter exceeded its instruction budget
/// - [`Error::NotSupported`] - The interpreter does not implement an operation
///
/// # Examples
///
/// ```rust
/// use tacopt::{Error, ir::{Instruction, RawInstruction}};
///
/// let raw = RawInstruction::default();
/// match Instruction::try_from(raw) {
///     Err(Error::Malformed { message, .. }) => assert!(message.contains("neither")),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be interpreted.
    ///
    /// Raised for instruction records carrying neither a `label` nor an `op`, and for control
    /// transfers naming a label that no block carries. The error includes the source location
    /// where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A variable was read with no reaching SSA name.
    ///
    /// Raised by SSA renaming when the name stack of a variable is empty at a use. This means
    /// some path from the function entry reaches the use without assigning the variable.
    #[error("Variable '{variable}' is used in block '{block}' without a reaching definition")]
    UndefinedVariable {
        /// The original (pre-SSA) variable name
        variable: String,
        /// The block containing the offending use
        block: String,
    },

    /// The renaming stacks were left unbalanced after visiting a block.
    ///
    /// This is a structural failure: it signals that the dominator tree and the control flow
    /// graph handed to the SSA builder disagree with each other.
    #[error("SSA stack for '{variable}' has depth {found} after leaving block '{block}', expected {expected}")]
    SsaStackMismatch {
        /// The block whose frame was being popped
        block: String,
        /// The variable whose stack is out of balance
        variable: String,
        /// Stack depth recorded on entry to the frame
        expected: usize,
        /// Stack depth observed on exit from the frame
        found: usize,
    },

    /// The function is not in static single assignment form.
    #[error("Function is not in SSA form - {0}")]
    NotInSsa(String),

    /// An analysis or transform selector was not recognised.
    #[error("Unknown pass or analysis selector - {0}")]
    UnknownSelector(String),

    /// The reference interpreter encountered a runtime fault.
    #[error("Emulation failed - {0}")]
    Emulation(String),

    /// The reference interpreter exceeded its instruction budget.
    ///
    /// The associated value is the budget that was exhausted.
    #[error("Emulation exceeded the step limit of {0} instructions")]
    StepLimit(u64),

    /// This operation is not supported.
    #[error("This operation is not supported")]
    NotSupported,
}
