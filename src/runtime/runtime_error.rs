use crate::bytecode::ir::Address;

/// Failure of the target machine while executing a program.
///
/// Each variant carries the position of the instruction that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("position {position}: access to negative address {address}")]
    NegativeAddress { address: Address, position: usize },

    #[error("position {position}: jump to {target} is outside the program ({len} instructions)")]
    JumpOutOfRange {
        target: usize,
        len: usize,
        position: usize,
    },

    #[error("position {position}: {opcode} has no usable operand")]
    MissingOperand { opcode: String, position: usize },

    #[error("position {position}: GET with no input left")]
    InputExhausted { position: usize },

    #[error("execution ran past the last instruction without HALT")]
    FellOffEnd,

    #[error("execution step limit exceeded ({0})")]
    StepLimit(usize),
}

impl RuntimeError {
    /// Position of the failing instruction, if execution was at one.
    pub fn position(&self) -> Option<usize> {
        match self {
            RuntimeError::NegativeAddress { position, .. }
            | RuntimeError::JumpOutOfRange { position, .. }
            | RuntimeError::MissingOperand { position, .. }
            | RuntimeError::InputExhausted { position } => Some(*position),
            RuntimeError::FellOffEnd | RuntimeError::StepLimit(_) => None,
        }
    }
}
