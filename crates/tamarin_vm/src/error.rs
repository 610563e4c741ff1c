use thiserror::Error;

/// Errors the compiler can bail out on. Most compile-time problems (missing
/// punctuation, invalid assignment targets, and so on) are reported directly
/// to stderr and tracked via `had_error`/`panic_mode` rather than returned as
/// values — these variants exist for the handful of call sites that need a
/// typed error to propagate (and for the `tracing` layer to log).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("compilation failed with errors")]
    HadError,
}

/// One variant per spec's §7 runtime error taxonomy. `Display` renders
/// exactly the message text the VM writes as the first line of a runtime
/// error report, before the per-frame traceback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,

    #[error("Operand must be a number.")]
    OperandMustBeNumber,

    #[error("Can only call functions and classes.")]
    NotCallable,

    #[error("Expected {expected} arguments but got {got}.")]
    WrongArity { expected: usize, got: usize },

    #[error("Only instances have properties.")]
    PropertyAccessOnNonInstance,

    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),

    #[error("Superclass must be a class.")]
    SuperclassMustBeClass,

    #[error("Stack overflow.")]
    StackOverflow,
}
