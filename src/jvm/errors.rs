use super::names::{BinaryName, UnqualifiedName};
use thiserror::Error;

/// Everything that can go wrong in this crate
///
/// Broadly there are three families of outcomes:
///
///   - malformed input (stack underflow, bad pool index, truncated code) is fatal for the
///     enclosing method's analysis and carries enough context to locate the bad bytecode
///   - references that don't resolve inside the class group are *not* errors at all; those
///     surface as `None`/missing edges at the call sites that produce them
///   - a bad rewrite request ([`Error::ParameterOutOfRange`]) is local to the one transform call
///     and leaves everything unmutated
#[derive(Debug, Error)]
pub enum Error {
    #[error("operand stack underflow at pc {pc}")]
    StackUnderflow { pc: u16 },

    #[error("operand of unexpected width {width} at pc {pc}")]
    InvalidWidth { width: usize, pc: u16 },

    #[error("constant at pc {pc} cannot be loaded by this instruction")]
    NotLoadableConstant { pc: u16 },

    #[error("constant pool index {index} is out of range for a pool of {width} slots")]
    PoolIndexOutOfRange { index: u16, width: u16 },

    #[error("constant pool index {index} points into the second slot of a wide constant")]
    PoolIndexUnusable { index: u16 },

    #[error("constant pool entry {index} is a {found}, expected a {expected}")]
    UnexpectedPoolEntry {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("constant pool grew past the u16 index range")]
    PoolOverflow,

    #[error("pool entry {index} does not fit the narrow index operand of ldc")]
    WidePoolIndex { index: u16 },

    #[error("parameter index {index} is out of range for a descriptor with {arity} parameters")]
    ParameterOutOfRange { index: usize, arity: usize },

    #[error("invalid opcode {opcode:#04x} at pc {pc}")]
    InvalidOpcode { opcode: u8, pc: u16 },

    #[error("unsupported opcode {opcode:#04x} at pc {pc}")]
    UnsupportedOpcode { opcode: u8, pc: u16 },

    #[error("code ends in the middle of the instruction starting at pc {pc}")]
    TruncatedCode { pc: u16 },

    #[error("malformed switch operands at pc {pc}")]
    MalformedSwitch { pc: u16 },

    #[error("pc {target} (reached from pc {pc}) is not an instruction boundary")]
    InvalidBranchTarget { pc: u16, target: u16 },

    #[error("execution falls off the end of the code after pc {pc}")]
    CodeFallsThrough { pc: u16 },

    #[error("local variable {index} is out of range at pc {pc}")]
    LocalOutOfRange { index: u16, pc: u16 },

    #[error("interpretation exceeded the budget of {budget} steps")]
    StepBudgetExceeded { budget: usize },

    /// Wrapper placing a method-analysis failure: which class, method, and descriptor the
    /// offending bytecode belongs to
    #[error("in {class:?}.{method:?}{descriptor}: {source}")]
    InMethod {
        class: BinaryName,
        method: UnqualifiedName,
        descriptor: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
